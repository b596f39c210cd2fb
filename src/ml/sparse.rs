//! Sparse vector representation shared by all pipeline stages.

use serde::{Deserialize, Serialize};

/// Sparse vector of `(index, weight)` entries sorted by ascending index.
///
/// Zero weights are never stored. `dim` is the dimension of the space the
/// vector lives in (vocabulary size for weighted vectors, selected feature
/// count for reduced vectors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Create an all-zero vector of the given dimension.
    pub fn zeros(dim: usize) -> Self {
        SparseVector {
            dim,
            entries: Vec::new(),
        }
    }

    /// Build a vector from unordered entries.
    ///
    /// Entries are sorted by index, zero weights are dropped and indices
    /// outside `dim` are rejected by returning `None`.
    pub fn from_entries(dim: usize, mut entries: Vec<(usize, f64)>) -> Option<Self> {
        if entries.iter().any(|&(idx, _)| idx >= dim) {
            return None;
        }
        entries.retain(|&(_, w)| w != 0.0);
        entries.sort_unstable_by_key(|&(idx, _)| idx);
        entries.dedup_by_key(|&mut (idx, _)| idx);
        Some(SparseVector { dim, entries })
    }

    /// Build a vector from a dense slice.
    pub fn from_dense(values: &[f64]) -> Self {
        SparseVector {
            dim: values.len(),
            entries: values
                .iter()
                .enumerate()
                .filter(|(_, w)| **w != 0.0)
                .map(|(idx, w)| (idx, *w))
                .collect(),
        }
    }

    /// Dimension of the vector space.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Non-zero entries, ascending by index.
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Whether every component is zero.
    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    /// Weight at `idx` (zero when absent).
    pub fn get(&self, idx: usize) -> f64 {
        self.entries
            .binary_search_by_key(&idx, |&(i, _)| i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    /// Euclidean norm.
    pub fn l2_norm(&self) -> f64 {
        self.squared_norm().sqrt()
    }

    /// Sum of squared weights.
    pub fn squared_norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum()
    }

    /// Scale to unit Euclidean norm. All-zero vectors are left unchanged.
    pub fn normalize(&mut self) {
        let norm = self.l2_norm();
        if norm > 0.0 {
            for (_, w) in &mut self.entries {
                *w /= norm;
            }
        }
    }

    /// Dot product with a dense weight vector of at least `dim` entries.
    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        self.entries.iter().map(|&(idx, w)| w * dense[idx]).sum()
    }

    /// Dense copy.
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dim];
        for &(idx, w) in &self.entries {
            dense[idx] = w;
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_entries_sorts_and_drops_zeros() {
        let v = SparseVector::from_entries(5, vec![(3, 2.0), (0, 1.0), (1, 0.0)]).unwrap();
        assert_eq!(v.entries(), &[(0, 1.0), (3, 2.0)]);
        assert_eq!(v.get(3), 2.0);
        assert_eq!(v.get(1), 0.0);
        assert!(SparseVector::from_entries(2, vec![(2, 1.0)]).is_none());
    }

    #[test]
    fn test_normalize() {
        let mut v = SparseVector::from_dense(&[3.0, 0.0, 4.0]);
        v.normalize();
        assert!((v.l2_norm() - 1.0).abs() < 1e-12);
        assert!((v.get(0) - 0.6).abs() < 1e-12);

        let mut zero = SparseVector::zeros(3);
        zero.normalize();
        assert!(zero.is_zero());
        assert_eq!(zero.to_dense(), vec![0.0; 3]);
    }

    #[test]
    fn test_dot_dense() {
        let v = SparseVector::from_dense(&[1.0, 0.0, 2.0]);
        assert_eq!(v.dot_dense(&[0.5, 10.0, 0.25]), 1.0);
    }
}
