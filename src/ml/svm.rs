//! Linear soft-margin support vector machine.
//!
//! Training solves the dual of the L1-loss (hinge) SVM by coordinate descent
//! (Hsieh et al., "A Dual Coordinate Descent Method for Large-scale Linear
//! SVM"), with the bias learned as the weight of a constant feature. The
//! coordinate order is shuffled every epoch by a seeded generator, so a fixed
//! seed reproduces the same hyperplanes.
//!
//! Two classes train a single hyperplane. More classes are decomposed
//! one-vs-rest: one hyperplane per class, prediction by the largest decision
//! value.

use std::collections::BTreeMap;

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::dataset::Label;
use crate::error::{Result, SvmTextError};
use crate::ml::sparse::SparseVector;

/// Solver hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    /// Soft-margin penalty.
    pub c: f64,
    /// Maximum number of passes over the training set.
    pub max_iter: usize,
    /// Stop when the projected-gradient spread falls below this value.
    pub tolerance: f64,
}

impl Default for SvmParams {
    fn default() -> Self {
        SvmParams {
            c: 1.0,
            max_iter: 1000,
            tolerance: 1e-3,
        }
    }
}

/// Separating hyperplane for one class against the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperplane {
    /// Label on the positive side.
    pub positive: Label,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl Hyperplane {
    fn decision(&self, vector: &SparseVector) -> f64 {
        vector.dot_dense(&self.weights) + self.bias
    }
}

/// Fitted classifier state as persisted in the `clf_model` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvmState {
    pub n_features: usize,
    /// Distinct training labels, ascending.
    pub classes: Vec<Label>,
    /// One hyperplane for two classes, otherwise one per class.
    pub hyperplanes: Vec<Hyperplane>,
    /// Label returned for vectors without any non-zero feature.
    pub default_label: Label,
    pub params: SvmParams,
}

/// Linear-kernel SVM classifier.
#[derive(Debug, Clone)]
pub struct LinearSvm {
    params: SvmParams,
    seed: u64,
    state: Option<LinearSvmState>,
}

impl LinearSvm {
    /// Create an unfitted classifier.
    pub fn new(params: SvmParams, seed: u64) -> Result<Self> {
        if !(params.c > 0.0 && params.c.is_finite()) {
            return Err(SvmTextError::invalid_config(format!(
                "SVM penalty c must be positive, got {}",
                params.c
            )));
        }
        if params.max_iter == 0 {
            return Err(SvmTextError::invalid_config("SVM max_iter must be at least 1"));
        }
        Ok(LinearSvm {
            params,
            seed,
            state: None,
        })
    }

    /// Train on reduced vectors and labels.
    pub fn fit(&mut self, vectors: &[SparseVector], labels: &[Label]) -> Result<()> {
        if vectors.is_empty() {
            return Err(SvmTextError::invalid_input("cannot fit classifier on no vectors"));
        }
        if vectors.len() != labels.len() {
            return Err(SvmTextError::invalid_input(format!(
                "{} vectors but {} labels",
                vectors.len(),
                labels.len()
            )));
        }
        let n_features = vectors[0].dim();
        if vectors.iter().any(|v| v.dim() != n_features) {
            return Err(SvmTextError::invalid_input(
                "all training vectors must share one dimension",
            ));
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
        let classes: Vec<Label> = class_counts.keys().copied().collect();

        // Most frequent label; the ascending scan keeps the smallest on ties.
        let mut default_label = classes[0];
        for (&label, &count) in &class_counts {
            if count > class_counts[&default_label] {
                default_label = label;
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let positives: Vec<Label> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        let hyperplanes = positives
            .into_iter()
            .map(|positive| {
                let targets: Vec<f64> = labels
                    .iter()
                    .map(|&l| if l == positive { 1.0 } else { -1.0 })
                    .collect();
                let (weights, bias) =
                    solve_dual(vectors, &targets, n_features, &self.params, &mut rng);
                Hyperplane {
                    positive,
                    weights,
                    bias,
                }
            })
            .collect();

        self.state = Some(LinearSvmState {
            n_features,
            classes,
            hyperplanes,
            default_label,
            params: self.params.clone(),
        });

        Ok(())
    }

    fn fitted_state(&self) -> Result<&LinearSvmState> {
        self.state
            .as_ref()
            .ok_or_else(|| SvmTextError::not_fitted("LinearSvm used before fit"))
    }

    /// Raw decision values, one per hyperplane.
    pub fn decision_function(&self, vector: &SparseVector) -> Result<Vec<f64>> {
        let state = self.fitted_state()?;
        check_dimension(state, vector)?;
        Ok(state.hyperplanes.iter().map(|h| h.decision(vector)).collect())
    }

    /// Predict the label of one reduced vector.
    pub fn predict(&self, vector: &SparseVector) -> Result<Label> {
        let state = self.fitted_state()?;
        let scores = self.decision_function(vector)?;

        if vector.is_zero() {
            return Ok(state.default_label);
        }

        if let [score] = scores.as_slice() {
            return Ok(if *score > 0.0 {
                state.hyperplanes[0].positive
            } else {
                state.classes[0]
            });
        }

        // Hyperplanes are ordered by ascending label; strict comparison keeps
        // the smallest label on ties.
        let mut best = 0;
        for (idx, &score) in scores.iter().enumerate().skip(1) {
            if score > scores[best] {
                best = idx;
            }
        }
        Ok(state.hyperplanes[best].positive)
    }

    /// Predict labels for many vectors.
    pub fn predict_batch(&self, vectors: &[SparseVector]) -> Result<Vec<Label>> {
        vectors.iter().map(|v| self.predict(v)).collect()
    }

    /// Mean accuracy on the given vectors and labels.
    pub fn score(&self, vectors: &[SparseVector], labels: &[Label]) -> Result<f64> {
        self.fitted_state()?;
        if vectors.len() != labels.len() {
            return Err(SvmTextError::invalid_input(format!(
                "{} vectors but {} labels",
                vectors.len(),
                labels.len()
            )));
        }
        if vectors.is_empty() {
            return Err(SvmTextError::invalid_input("cannot score an empty set"));
        }

        let predictions = self.predict_batch(vectors)?;
        let correct = predictions
            .iter()
            .zip(labels)
            .filter(|(p, l)| p == l)
            .count();
        Ok(correct as f64 / labels.len() as f64)
    }

    /// Whether `fit` has completed.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Feature dimension, once fitted.
    pub fn n_features(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.n_features)
    }

    /// Training classes, once fitted.
    pub fn classes(&self) -> Option<&[Label]> {
        self.state.as_ref().map(|s| s.classes.as_slice())
    }

    /// Export the fitted state.
    pub fn to_state(&self) -> Result<LinearSvmState> {
        self.fitted_state().cloned()
    }

    /// Rebuild a fitted classifier from persisted state.
    pub fn from_state(state: LinearSvmState) -> Result<Self> {
        if state.classes.len() < 2 || !state.classes.windows(2).all(|w| w[0] < w[1]) {
            return Err(SvmTextError::artifact_load(
                "classifier classes must be at least two unique ascending labels",
            ));
        }
        let expected_planes = if state.classes.len() == 2 {
            1
        } else {
            state.classes.len()
        };
        if state.hyperplanes.len() != expected_planes {
            return Err(SvmTextError::artifact_load(format!(
                "classifier has {} hyperplanes for {} classes",
                state.hyperplanes.len(),
                state.classes.len()
            )));
        }
        for hyperplane in &state.hyperplanes {
            if hyperplane.weights.len() != state.n_features {
                return Err(SvmTextError::artifact_load(format!(
                    "hyperplane has {} weights for {} features",
                    hyperplane.weights.len(),
                    state.n_features
                )));
            }
            if !hyperplane.bias.is_finite() || hyperplane.weights.iter().any(|w| !w.is_finite()) {
                return Err(SvmTextError::artifact_load("hyperplane parameters must be finite"));
            }
            if !state.classes.contains(&hyperplane.positive) {
                return Err(SvmTextError::artifact_load(format!(
                    "hyperplane label {} is not a known class",
                    hyperplane.positive
                )));
            }
        }
        if !state.classes.contains(&state.default_label) {
            return Err(SvmTextError::artifact_load("default label is not a known class"));
        }

        Ok(LinearSvm {
            params: state.params.clone(),
            seed: 0,
            state: Some(state),
        })
    }
}

fn check_dimension(state: &LinearSvmState, vector: &SparseVector) -> Result<()> {
    if vector.dim() != state.n_features {
        return Err(SvmTextError::invalid_input(format!(
            "classifier was fit on {} features, got a vector of dimension {}",
            state.n_features,
            vector.dim()
        )));
    }
    Ok(())
}

/// Dual coordinate descent for one binary problem with targets in {-1, +1}.
fn solve_dual(
    vectors: &[SparseVector],
    targets: &[f64],
    n_features: usize,
    params: &SvmParams,
    rng: &mut StdRng,
) -> (Vec<f64>, f64) {
    let c = params.c;
    let mut alpha = vec![0.0; vectors.len()];
    let mut weights = vec![0.0; n_features];
    let mut bias = 0.0;

    // Diagonal of the dual Hessian; the constant bias feature adds 1.
    let diagonal: Vec<f64> = vectors.iter().map(|v| v.squared_norm() + 1.0).collect();
    let mut order: Vec<usize> = (0..vectors.len()).collect();

    for iteration in 0..params.max_iter {
        order.shuffle(rng);
        let mut pg_max = f64::NEG_INFINITY;
        let mut pg_min = f64::INFINITY;

        for &i in &order {
            let y = targets[i];
            let gradient = y * (vectors[i].dot_dense(&weights) + bias) - 1.0;
            let projected = if alpha[i] <= 0.0 {
                gradient.min(0.0)
            } else if alpha[i] >= c {
                gradient.max(0.0)
            } else {
                gradient
            };
            pg_max = pg_max.max(projected);
            pg_min = pg_min.min(projected);

            if projected.abs() > 1e-12 {
                let previous = alpha[i];
                alpha[i] = (previous - gradient / diagonal[i]).clamp(0.0, c);
                let step = (alpha[i] - previous) * y;
                for &(idx, x) in vectors[i].entries() {
                    weights[idx] += step * x;
                }
                bias += step;
            }
        }

        if pg_max - pg_min < params.tolerance {
            debug!("dual coordinate descent converged after {} passes", iteration + 1);
            return (weights, bias);
        }
    }

    debug!(
        "dual coordinate descent stopped at max_iter={} without converging",
        params.max_iter
    );
    (weights, bias)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(rows: &[&[f64]]) -> Vec<SparseVector> {
        rows.iter().map(|r| SparseVector::from_dense(r)).collect()
    }

    fn fitted(vectors: &[SparseVector], labels: &[Label]) -> LinearSvm {
        let mut svm = LinearSvm::new(SvmParams::default(), 42).unwrap();
        svm.fit(vectors, labels).unwrap();
        svm
    }

    #[test]
    fn test_binary_separable() {
        let vectors = dense(&[&[1.0, 0.0], &[0.9, 0.1], &[0.0, 1.0], &[0.1, 0.9]]);
        let labels = [0, 0, 1, 1];
        let svm = fitted(&vectors, &labels);

        assert_eq!(svm.score(&vectors, &labels).unwrap(), 1.0);
        assert_eq!(svm.predict(&SparseVector::from_dense(&[0.8, 0.0])).unwrap(), 0);
        assert_eq!(svm.predict(&SparseVector::from_dense(&[0.0, 0.7])).unwrap(), 1);
        assert_eq!(svm.to_state().unwrap().hyperplanes.len(), 1);
    }

    #[test]
    fn test_decision_function_sign_matches_prediction() {
        let vectors = dense(&[&[1.0, 0.0], &[0.9, 0.1], &[0.0, 1.0], &[0.1, 0.9]]);
        let svm = fitted(&vectors, &[3, 3, 8, 8]);

        let toward_positive = SparseVector::from_dense(&[0.0, 1.0]);
        let toward_negative = SparseVector::from_dense(&[1.0, 0.0]);
        let scores = svm.decision_function(&toward_positive).unwrap();
        assert_eq!(scores.len(), 1);
        assert!(scores[0] > 0.0);
        assert!(svm.decision_function(&toward_negative).unwrap()[0] < 0.0);
        assert_eq!(svm.predict(&toward_positive).unwrap(), 8);
        assert_eq!(svm.predict(&toward_negative).unwrap(), 3);
    }

    #[test]
    fn test_one_vs_rest_multiclass() {
        let vectors = dense(&[
            &[1.0, 0.0, 0.0],
            &[0.9, 0.1, 0.0],
            &[0.0, 1.0, 0.0],
            &[0.1, 0.9, 0.0],
            &[0.0, 0.0, 1.0],
            &[0.0, 0.1, 0.9],
        ]);
        let labels = [5, 5, 7, 7, 9, 9];
        let svm = fitted(&vectors, &labels);

        assert_eq!(svm.classes().unwrap(), &[5, 7, 9]);
        assert_eq!(svm.to_state().unwrap().hyperplanes.len(), 3);
        assert_eq!(svm.score(&vectors, &labels).unwrap(), 1.0);
        assert_eq!(svm.predict(&SparseVector::from_dense(&[0.0, 0.0, 0.5])).unwrap(), 9);
    }

    #[test]
    fn test_zero_vector_returns_majority_label() {
        let vectors = dense(&[&[1.0, 0.0], &[0.0, 1.0], &[0.0, 0.8]]);
        let svm = fitted(&vectors, &[4, 2, 2]);
        assert_eq!(svm.predict(&SparseVector::zeros(2)).unwrap(), 2);

        // Balanced counts fall back to the smallest label.
        let svm = fitted(&dense(&[&[1.0, 0.0], &[0.0, 1.0]]), &[1, 0]);
        assert_eq!(svm.predict(&SparseVector::zeros(2)).unwrap(), 0);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let vectors = dense(&[&[1.0, 0.2], &[0.3, 0.9], &[0.8, 0.1], &[0.2, 0.7], &[0.5, 0.5]]);
        let labels = [0, 1, 0, 1, 0];
        let a = fitted(&vectors, &labels).to_state().unwrap();
        let b = fitted(&vectors, &labels).to_state().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_not_fitted_and_errors() {
        let svm = LinearSvm::new(SvmParams::default(), 1).unwrap();
        assert!(matches!(
            svm.predict(&SparseVector::zeros(1)),
            Err(SvmTextError::NotFitted(_))
        ));
        assert!(matches!(
            svm.score(&[], &[]),
            Err(SvmTextError::NotFitted(_))
        ));

        let mut svm = LinearSvm::new(SvmParams::default(), 1).unwrap();
        assert!(matches!(
            svm.fit(&dense(&[&[1.0], &[0.5]]), &[1, 1]),
            Err(SvmTextError::InvalidInput(_))
        ));

        let invalid = SvmParams {
            c: 0.0,
            ..SvmParams::default()
        };
        assert!(LinearSvm::new(invalid, 1).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let svm = fitted(&dense(&[&[1.0, 0.0], &[0.0, 1.0]]), &[0, 1]);
        assert!(matches!(
            svm.predict(&SparseVector::from_dense(&[1.0, 0.0, 0.0])),
            Err(SvmTextError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_state_round_trip_and_validation() {
        let svm = fitted(&dense(&[&[1.0, 0.0], &[0.0, 1.0]]), &[0, 1]);
        let state = svm.to_state().unwrap();
        let restored = LinearSvm::from_state(state.clone()).unwrap();
        let point = SparseVector::from_dense(&[0.3, 0.6]);
        assert_eq!(svm.predict(&point).unwrap(), restored.predict(&point).unwrap());

        let mut broken = state;
        broken.hyperplanes[0].weights.pop();
        assert!(matches!(
            LinearSvm::from_state(broken),
            Err(SvmTextError::ArtifactLoad(_))
        ));
    }
}
