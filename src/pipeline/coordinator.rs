//! The pipeline coordinator.
//!
//! [`PipelineCoordinator`] owns the current [`PipelineArtifacts`] triple and
//! is the only way to train, persist, reload and query it. Predictions take a
//! shared lock only long enough to clone the `Arc` of the current triple;
//! training builds a complete new triple off to the side, persists it, and
//! then publishes it with a single pointer swap.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::cleaner::TextCleaner;
use crate::analysis::stop_words::load_stopwords;
use crate::dataset::{Label, LabeledDataset, load_labeled_pairs};
use crate::error::{Result, SvmTextError};
use crate::ml::chi2::Chi2Selector;
use crate::ml::svm::LinearSvm;
use crate::ml::tfidf::{TfIdfOptions, TfIdfVectorizer};
use crate::pipeline::artifacts::PipelineArtifacts;
use crate::pipeline::config::{KernelKind, PipelineConfig};
use crate::storage::traits::Storage;

/// Outcome of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Accuracy of the frozen pipeline on the held-out partition.
    pub accuracy: f64,
    /// Number of features kept by the selector.
    pub feature_count: usize,
    pub vocabulary_size: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub classes: Vec<Label>,
    /// Generation id written into the persisted artifacts.
    pub generation: Uuid,
}

/// Trains, persists, reloads and serves the classification pipeline.
#[derive(Debug)]
pub struct PipelineCoordinator {
    config: PipelineConfig,
    storage: Arc<dyn Storage>,
    cleaner: Arc<dyn TextCleaner>,
    artifacts: RwLock<Option<Arc<PipelineArtifacts>>>,
    train_lock: Mutex<()>,
}

impl PipelineCoordinator {
    /// Create a coordinator with no model. Call [`train`](Self::train) or
    /// [`reload`](Self::reload) before predicting.
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn Storage>,
        cleaner: Arc<dyn TextCleaner>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(PipelineCoordinator {
            config,
            storage,
            cleaner,
            artifacts: RwLock::new(None),
            train_lock: Mutex::new(()),
        })
    }

    /// Build a ready coordinator.
    ///
    /// Loads the persisted triple when it is complete and consistent.
    /// Otherwise all persisted artifacts are ignored and the pipeline is
    /// retrained from `config.train_path`.
    pub fn load_or_train(
        config: PipelineConfig,
        storage: Arc<dyn Storage>,
        cleaner: Arc<dyn TextCleaner>,
    ) -> Result<Self> {
        let coordinator = Self::new(config, storage, cleaner)?;

        match coordinator.reload() {
            Ok(()) => return Ok(coordinator),
            Err(SvmTextError::ArtifactLoad(reason)) => {
                warn!("persisted model rejected, retraining from scratch: {reason}");
            }
            Err(e) => return Err(e),
        }

        let dataset = load_labeled_pairs(&coordinator.config.train_path)?;
        let test_fraction = coordinator.config.test_fraction;
        coordinator.train(&dataset, test_fraction)?;
        Ok(coordinator)
    }

    /// Fit all three stages on `dataset`, evaluate on a held-out share,
    /// persist the triple and publish it.
    ///
    /// On any failure neither the in-memory nor the persisted triple changes.
    pub fn train(&self, dataset: &LabeledDataset, test_fraction: f64) -> Result<TrainingReport> {
        let _guard = self.train_lock.lock();

        if dataset.is_empty() {
            return Err(SvmTextError::data_load("training dataset is empty"));
        }
        let classes = dataset.classes();
        if classes.len() < 2 {
            return Err(SvmTextError::invalid_input(format!(
                "training needs at least 2 distinct labels, got {}",
                classes.len()
            )));
        }

        let (train_set, test_set) = dataset.split(test_fraction, self.config.seed)?;
        if test_set.is_empty() {
            return Err(SvmTextError::invalid_input(format!(
                "test_fraction {test_fraction} leaves no held-out samples out of {}",
                dataset.len()
            )));
        }
        info!(
            "training on {} samples, holding out {} ({} classes)",
            train_set.len(),
            test_set.len(),
            classes.len()
        );

        info!("cleaning texts with the {} cleaner", self.cleaner.name());
        let train_texts = self.clean_all(&train_set.texts());
        let train_labels = train_set.labels();

        let mut vectorizer = self.build_vectorizer()?;
        let weighted = vectorizer.fit_transform(&train_texts)?;
        info!("vocabulary size {}", vectorizer.vocabulary_size());

        let mut selector = Chi2Selector::new(self.config.feature_ratio)?;
        selector.fit(&weighted, &train_labels)?;
        let reduced = selector.transform(&weighted)?;
        let feature_count = selector.selected().map_or(0, |s| s.len());
        info!("selected {feature_count} features");

        let mut classifier = match self.config.kernel {
            KernelKind::Linear => LinearSvm::new(self.config.svm.clone(), self.config.seed)?,
        };
        classifier.fit(&reduced, &train_labels)?;

        let artifacts = PipelineArtifacts::new(vectorizer, selector, classifier)?;

        let test_texts = self.clean_all(&test_set.texts());
        let predictions = artifacts.predict_many(&test_texts)?;
        let correct = predictions
            .iter()
            .zip(test_set.labels())
            .filter(|(predicted, actual)| **predicted == *actual)
            .count();
        let accuracy = correct as f64 / test_set.len() as f64;

        artifacts.save(self.storage.as_ref())?;

        let report = TrainingReport {
            accuracy,
            feature_count,
            vocabulary_size: artifacts.vectorizer().vocabulary_size(),
            train_size: train_set.len(),
            test_size: test_set.len(),
            classes: classes.into_iter().collect(),
            generation: artifacts.metadata().generation,
        };
        info!(
            "trained generation {} with accuracy {:.4}",
            report.generation, report.accuracy
        );

        *self.artifacts.write() = Some(Arc::new(artifacts));
        Ok(report)
    }

    /// Classify one raw text.
    pub fn predict(&self, text: &str) -> Result<Label> {
        let artifacts = self.current()?;
        artifacts.predict(&self.cleaner.clean(text))
    }

    /// Classify many raw texts against one snapshot of the model.
    pub fn predict_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Label>> {
        let artifacts = self.current()?;
        let cleaned = self.clean_all(texts);
        artifacts.predict_many(&cleaned)
    }

    /// Replace the in-memory triple with the persisted one.
    ///
    /// Fails with `ArtifactLoad` and leaves the current triple in place if the
    /// persisted triple is incomplete or inconsistent.
    pub fn reload(&self) -> Result<()> {
        let _guard = self.train_lock.lock();
        let artifacts = PipelineArtifacts::load(self.storage.as_ref())?;
        info!(
            "loaded model generation {} trained at {}",
            artifacts.metadata().generation,
            artifacts.metadata().trained_at
        );
        *self.artifacts.write() = Some(Arc::new(artifacts));
        Ok(())
    }

    /// Whether a model is available for prediction.
    pub fn is_ready(&self) -> bool {
        self.artifacts.read().is_some()
    }

    /// Snapshot of the current triple.
    pub fn artifacts(&self) -> Option<Arc<PipelineArtifacts>> {
        self.artifacts.read().clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn current(&self) -> Result<Arc<PipelineArtifacts>> {
        self.artifacts
            .read()
            .clone()
            .ok_or_else(|| SvmTextError::model_not_ready("no model has been trained or loaded"))
    }

    fn clean_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        texts.iter().map(|t| self.cleaner.clean(t.as_ref())).collect()
    }

    fn build_vectorizer(&self) -> Result<TfIdfVectorizer> {
        let vectorizer = TfIdfVectorizer::new(TfIdfOptions::default())?;
        match (&self.config.stop_path, self.config.use_stopwords) {
            (Some(path), true) => {
                let stop_words = load_stopwords(path)?;
                info!("using {} stop words from {}", stop_words.len(), path.display());
                Ok(vectorizer.with_stop_words(stop_words))
            }
            _ => Ok(vectorizer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cleaner::StandardCleaner;
    use crate::storage::memory::MemoryStorage;

    fn loan_dataset() -> LabeledDataset {
        LabeledDataset::from_pairs(&[
            ("I need a loan now", 0),
            ("not interested at all", 1),
            ("please lend me money", 0),
            ("no thanks bye", 1),
        ])
    }

    fn coordinator(storage: Arc<MemoryStorage>) -> PipelineCoordinator {
        PipelineCoordinator::new(
            PipelineConfig::default(),
            storage,
            Arc::new(StandardCleaner::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_predict_before_training() {
        let coordinator = coordinator(Arc::new(MemoryStorage::new()));
        assert!(!coordinator.is_ready());
        assert!(matches!(
            coordinator.predict("need a loan"),
            Err(SvmTextError::ModelNotReady(_))
        ));
    }

    #[test]
    fn test_train_then_predict() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = coordinator(Arc::clone(&storage));

        let report = coordinator.train(&loan_dataset(), 0.5).unwrap();
        assert!((0.0..=1.0).contains(&report.accuracy));
        assert_eq!(report.train_size, 2);
        assert_eq!(report.test_size, 2);
        assert_eq!(report.classes, vec![0, 1]);
        assert_eq!(
            report.feature_count,
            Chi2Selector::feature_count(report.vocabulary_size, 0.2)
        );

        assert!(coordinator.is_ready());
        assert_eq!(coordinator.predict("lend me some cash").unwrap(), 0);
        assert_eq!(storage.file_count(), 3);
    }

    #[test]
    fn test_training_errors_keep_previous_model() {
        let coordinator = coordinator(Arc::new(MemoryStorage::new()));
        let report = coordinator.train(&loan_dataset(), 0.5).unwrap();

        assert!(matches!(
            coordinator.train(&LabeledDataset::default(), 0.5),
            Err(SvmTextError::DataLoad(_))
        ));
        let single = LabeledDataset::from_pairs(&[("a loan", 0), ("more loans", 0)]);
        assert!(matches!(
            coordinator.train(&single, 0.5),
            Err(SvmTextError::InvalidInput(_))
        ));

        let current = coordinator.artifacts().unwrap();
        assert_eq!(current.metadata().generation, report.generation);
    }

    #[test]
    fn test_reload_picks_up_persisted_model() {
        let storage = Arc::new(MemoryStorage::new());
        let trainer = coordinator(Arc::clone(&storage));
        let report = trainer.train(&loan_dataset(), 0.5).unwrap();

        let server = coordinator(Arc::clone(&storage));
        server.reload().unwrap();
        assert_eq!(
            server.artifacts().unwrap().metadata().generation,
            report.generation
        );
        assert_eq!(
            server.predict_batch(&["need money", "no thanks"]).unwrap(),
            trainer.predict_batch(&["need money", "no thanks"]).unwrap()
        );
    }
}
