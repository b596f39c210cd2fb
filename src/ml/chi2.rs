//! Chi-squared feature selection.
//!
//! Scores every feature by the chi-squared statistic between its weight
//! distribution and the class labels and keeps the `k` highest-scoring
//! features, `k = max(1, floor(n_features * ratio))`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::Label;
use crate::error::{Result, SvmTextError};
use crate::ml::sparse::SparseVector;

/// Default share of features retained.
pub const DEFAULT_FEATURE_RATIO: f64 = 0.2;

/// Fitted selector state as persisted in the `chi_model` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chi2State {
    /// Dimension of the vectors the selector was fit on.
    pub n_features_in: usize,
    pub feature_ratio: f64,
    /// Retained feature indices, ascending.
    pub selected: Vec<usize>,
    /// Chi-squared score per input feature.
    pub scores: Vec<f64>,
}

/// Selects the k most class-dependent features.
#[derive(Debug, Clone)]
pub struct Chi2Selector {
    feature_ratio: f64,
    state: Option<Chi2State>,
}

impl Chi2Selector {
    /// Create an unfitted selector keeping `feature_ratio` of the features.
    pub fn new(feature_ratio: f64) -> Result<Self> {
        if !(feature_ratio > 0.0 && feature_ratio <= 1.0) {
            return Err(SvmTextError::invalid_config(format!(
                "feature_ratio must be in (0, 1], got {feature_ratio}"
            )));
        }
        Ok(Chi2Selector {
            feature_ratio,
            state: None,
        })
    }

    /// Number of features retained out of `n_features`.
    pub fn feature_count(n_features: usize, feature_ratio: f64) -> usize {
        let k = ((n_features as f64) * feature_ratio + 1e-9).floor() as usize;
        k.clamp(1, n_features.max(1))
    }

    /// Fit on weighted vectors and their labels.
    pub fn fit(&mut self, vectors: &[SparseVector], labels: &[Label]) -> Result<()> {
        if vectors.is_empty() {
            return Err(SvmTextError::invalid_input("cannot fit selector on no vectors"));
        }
        if vectors.len() != labels.len() {
            return Err(SvmTextError::invalid_input(format!(
                "{} vectors but {} labels",
                vectors.len(),
                labels.len()
            )));
        }

        let n_features = vectors[0].dim();
        if n_features == 0 {
            return Err(SvmTextError::invalid_input("vectors have zero dimension"));
        }
        for vector in vectors {
            if vector.dim() != n_features {
                return Err(SvmTextError::invalid_input(format!(
                    "vector dimension {} differs from {n_features}",
                    vector.dim()
                )));
            }
            if vector.entries().iter().any(|&(_, w)| w < 0.0 || w.is_nan()) {
                return Err(SvmTextError::invalid_input(
                    "chi-squared selection requires non-negative feature weights",
                ));
            }
        }

        let mut class_counts: BTreeMap<Label, usize> = BTreeMap::new();
        for &label in labels {
            *class_counts.entry(label).or_insert(0) += 1;
        }
        if class_counts.len() < 2 {
            return Err(SvmTextError::invalid_input(format!(
                "need at least 2 distinct labels, got {}",
                class_counts.len()
            )));
        }

        let scores = chi2_scores(vectors, labels, &class_counts, n_features);

        let k = Self::feature_count(n_features, self.feature_ratio);
        let mut ranked: Vec<usize> = (0..n_features).collect();
        // Highest score first; equal scores keep ascending index order.
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        let mut selected: Vec<usize> = ranked.into_iter().take(k).collect();
        selected.sort_unstable();

        self.state = Some(Chi2State {
            n_features_in: n_features,
            feature_ratio: self.feature_ratio,
            selected,
            scores,
        });

        Ok(())
    }

    /// Restrict vectors to the selected features.
    pub fn transform(&self, vectors: &[SparseVector]) -> Result<Vec<SparseVector>> {
        if !self.is_fitted() {
            return Err(SvmTextError::not_fitted(
                "Chi2Selector::transform called before fit",
            ));
        }
        vectors.iter().map(|vector| self.transform_one(vector)).collect()
    }

    /// Restrict one vector to the selected features.
    pub fn transform_one(&self, vector: &SparseVector) -> Result<SparseVector> {
        let state = self.state.as_ref().ok_or_else(|| {
            SvmTextError::not_fitted("Chi2Selector::transform called before fit")
        })?;

        if vector.dim() != state.n_features_in {
            return Err(SvmTextError::invalid_input(format!(
                "selector was fit on {} features, got a vector of dimension {}",
                state.n_features_in,
                vector.dim()
            )));
        }

        let entries = vector
            .entries()
            .iter()
            .filter_map(|&(idx, w)| state.selected.binary_search(&idx).ok().map(|pos| (pos, w)))
            .collect();
        SparseVector::from_entries(state.selected.len(), entries)
            .ok_or_else(|| SvmTextError::invalid_input("reduced index out of range"))
    }

    /// Whether `fit` has completed.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Input dimension, once fitted.
    pub fn n_features_in(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.n_features_in)
    }

    /// Selected feature indices (ascending), once fitted.
    pub fn selected(&self) -> Option<&[usize]> {
        self.state.as_ref().map(|s| s.selected.as_slice())
    }

    /// Per-feature scores, once fitted.
    pub fn scores(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.scores.as_slice())
    }

    /// Export the fitted state.
    pub fn to_state(&self) -> Result<Chi2State> {
        self.state
            .clone()
            .ok_or_else(|| SvmTextError::not_fitted("Chi2Selector has not been fit"))
    }

    /// Rebuild a fitted selector from persisted state.
    pub fn from_state(state: Chi2State) -> Result<Self> {
        if state.selected.is_empty() || state.selected.len() > state.n_features_in {
            return Err(SvmTextError::artifact_load(format!(
                "selector keeps {} of {} features",
                state.selected.len(),
                state.n_features_in
            )));
        }
        if state.scores.len() != state.n_features_in {
            return Err(SvmTextError::artifact_load(format!(
                "selector has {} scores for {} features",
                state.scores.len(),
                state.n_features_in
            )));
        }
        let ascending = state.selected.windows(2).all(|w| w[0] < w[1]);
        let in_range = state.selected.iter().all(|&idx| idx < state.n_features_in);
        if !ascending || !in_range {
            return Err(SvmTextError::artifact_load(
                "selected indices must be unique, ascending and within range",
            ));
        }

        Ok(Chi2Selector {
            feature_ratio: state.feature_ratio,
            state: Some(state),
        })
    }
}

fn chi2_scores(
    vectors: &[SparseVector],
    labels: &[Label],
    class_counts: &BTreeMap<Label, usize>,
    n_features: usize,
) -> Vec<f64> {
    let class_index: BTreeMap<Label, usize> = class_counts
        .keys()
        .enumerate()
        .map(|(i, &label)| (label, i))
        .collect();
    let n_samples = labels.len() as f64;

    let mut observed = vec![vec![0.0; n_features]; class_counts.len()];
    for (vector, label) in vectors.iter().zip(labels) {
        let row = &mut observed[class_index[label]];
        for &(idx, w) in vector.entries() {
            row[idx] += w;
        }
    }

    let feature_totals: Vec<f64> = (0..n_features)
        .map(|f| observed.iter().map(|row| row[f]).sum())
        .collect();

    (0..n_features)
        .map(|f| {
            class_counts
                .values()
                .zip(&observed)
                .map(|(&count, row)| {
                    let expected = count as f64 / n_samples * feature_totals[f];
                    if expected > 0.0 {
                        (row[f] - expected).powi(2) / expected
                    } else {
                        0.0
                    }
                })
                .sum()
        })
        .collect()
}
