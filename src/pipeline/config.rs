//! Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmTextError};
use crate::ml::chi2::DEFAULT_FEATURE_RATIO;
use crate::ml::svm::SvmParams;

/// Kernel used by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// Identity kernel; the only supported choice.
    #[default]
    Linear,
}

/// Configuration for training and serving the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Training file in `text##label` format.
    pub train_path: PathBuf,
    /// Stop word file, one token per line.
    pub stop_path: Option<PathBuf>,
    /// Directory holding the `tf_model`, `chi_model` and `clf_model` artifacts.
    pub model_dir: PathBuf,
    /// Share of the dataset held out for evaluation.
    pub test_fraction: f64,
    /// Share of the vocabulary kept by feature selection.
    pub feature_ratio: f64,
    /// Classifier kernel.
    pub kernel: KernelKind,
    /// Apply the stop word list when fitting the vectorizer.
    pub use_stopwords: bool,
    /// Seed for the train/test split and the solver's coordinate order.
    pub seed: u64,
    /// Classifier hyperparameters.
    pub svm: SvmParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            train_path: PathBuf::from("data/train.txt"),
            stop_path: None,
            model_dir: PathBuf::from("models/svm"),
            test_fraction: 0.2,
            feature_ratio: DEFAULT_FEATURE_RATIO,
            kernel: KernelKind::Linear,
            use_stopwords: false,
            seed: 42,
            svm: SvmParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SvmTextError::invalid_config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(SvmTextError::invalid_config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !(self.feature_ratio > 0.0 && self.feature_ratio <= 1.0) {
            return Err(SvmTextError::invalid_config(format!(
                "feature_ratio must be in (0, 1], got {}",
                self.feature_ratio
            )));
        }
        if !(self.svm.c > 0.0 && self.svm.c.is_finite()) {
            return Err(SvmTextError::invalid_config(format!(
                "svm.c must be positive, got {}",
                self.svm.c
            )));
        }
        if self.svm.max_iter == 0 {
            return Err(SvmTextError::invalid_config("svm.max_iter must be at least 1"));
        }
        if self.use_stopwords && self.stop_path.is_none() {
            return Err(SvmTextError::invalid_config(
                "use_stopwords is set but no stop_path is configured",
            ));
        }
        Ok(())
    }
}
