use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use svmtext::analysis::cleaner::StandardCleaner;
use svmtext::dataset::LabeledDataset;
use svmtext::error::{Result, SvmTextError};
use svmtext::pipeline::{PipelineArtifacts, PipelineConfig, PipelineCoordinator};
use svmtext::storage::{
    FileStorage, MemoryStorage, Storage, StorageConfig, StorageError, StorageInput, StorageOutput,
};
use tempfile::TempDir;

const TRAINING_LINES: &str = "\
i need a loan to pay my rent##0
can you lend me some money today##0
looking for a personal loan with low interest##0
how much cash can i borrow##0
not interested thank you##1
please stop calling me##1
no thanks have a nice day##1
wrong number sorry##1
";

fn write_training_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("train.txt");
    fs::write(&path, TRAINING_LINES).unwrap();
    path
}

fn file_config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        train_path: write_training_file(dir.path()),
        model_dir: dir.path().join("models"),
        test_fraction: 0.25,
        ..PipelineConfig::default()
    }
}

fn file_storage(config: &PipelineConfig) -> Result<Arc<dyn Storage>> {
    Ok(Arc::new(FileStorage::new(
        &config.model_dir,
        StorageConfig::default(),
    )?))
}

fn load_or_train(config: &PipelineConfig) -> Result<PipelineCoordinator> {
    PipelineCoordinator::load_or_train(
        config.clone(),
        file_storage(config)?,
        Arc::new(StandardCleaner::new()),
    )
}

#[test]
fn test_load_or_train_trains_then_reuses() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    let first = load_or_train(&config)?;
    let generation = first.artifacts().unwrap().metadata().generation;
    for name in ["tf_model", "chi_model", "clf_model"] {
        assert!(config.model_dir.join(name).exists(), "{name} should be written");
    }

    // Second start finds a complete triple and does not retrain.
    let second = load_or_train(&config)?;
    assert_eq!(second.artifacts().unwrap().metadata().generation, generation);
    assert_eq!(
        first.predict_batch(&["need a loan", "stop calling"])?,
        second.predict_batch(&["need a loan", "stop calling"])?
    );
    Ok(())
}

#[test]
fn test_missing_artifact_triggers_full_retrain() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    let original = load_or_train(&config)?.artifacts().unwrap().metadata().generation;
    fs::remove_file(config.model_dir.join("chi_model")).unwrap();

    let retrained = load_or_train(&config)?;
    let generation = retrained.artifacts().unwrap().metadata().generation;
    assert_ne!(generation, original);

    // All three blobs now belong to the new run.
    let storage = file_storage(&config)?;
    let reloaded = PipelineArtifacts::load(storage.as_ref())?;
    assert_eq!(reloaded.metadata().generation, generation);
    Ok(())
}

#[test]
fn test_corrupt_artifact_triggers_retrain() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    let original = load_or_train(&config)?.artifacts().unwrap().metadata().generation;
    fs::write(config.model_dir.join("clf_model"), b"{\"truncated\":").unwrap();

    let retrained = load_or_train(&config)?;
    assert_ne!(retrained.artifacts().unwrap().metadata().generation, original);
    Ok(())
}

#[test]
fn test_missing_training_file_is_a_data_error() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        train_path: dir.path().join("absent.txt"),
        model_dir: dir.path().join("models"),
        ..PipelineConfig::default()
    };

    assert!(matches!(
        load_or_train(&config),
        Err(SvmTextError::DataLoad(_))
    ));
    Ok(())
}

#[test]
fn test_reload_without_model_fails_closed() -> Result<()> {
    let coordinator = PipelineCoordinator::new(
        PipelineConfig::default(),
        Arc::new(MemoryStorage::new()),
        Arc::new(StandardCleaner::new()),
    )?;

    assert!(matches!(
        coordinator.reload(),
        Err(SvmTextError::ArtifactLoad(_))
    ));
    assert!(!coordinator.is_ready());
    Ok(())
}

/// Memory storage that can be told to fail writing or installing one blob.
#[derive(Debug, Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    fail_create: AtomicBool,
    fail_rename: AtomicBool,
}

const FLAKY_BLOB: &str = "clf_model";

impl Storage for FlakyStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        self.inner.open_input(name)
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        if self.fail_create.load(Ordering::SeqCst) && name.starts_with(FLAKY_BLOB) {
            return Err(StorageError::IoError("disk full".to_string()).into());
        }
        self.inner.create_output(name)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.inner.file_exists(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.inner.delete_file(name)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.inner.list_files()
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let installing = old_name.ends_with(".tmp") && new_name == FLAKY_BLOB;
        if self.fail_rename.load(Ordering::SeqCst) && installing {
            return Err(StorageError::IoError("rename interrupted".to_string()).into());
        }
        self.inner.rename_file(old_name, new_name)
    }

    fn sync(&self) -> Result<()> {
        self.inner.sync()
    }
}

fn dataset() -> LabeledDataset {
    TRAINING_LINES
        .lines()
        .filter_map(|line| line.split_once("##"))
        .map(|(text, label)| (text.to_string(), label.parse().unwrap()))
        .collect()
}

#[test]
fn test_failed_write_keeps_previous_triple() -> Result<()> {
    let storage = Arc::new(FlakyStorage::default());
    let coordinator = PipelineCoordinator::new(
        PipelineConfig::default(),
        storage.clone(),
        Arc::new(StandardCleaner::new()),
    )?;

    let report = coordinator.train(&dataset(), 0.25)?;

    storage.fail_create.store(true, Ordering::SeqCst);
    assert!(matches!(
        coordinator.train(&dataset(), 0.25),
        Err(SvmTextError::Storage(_))
    ));

    // No temporaries left behind, persisted and in-memory triples untouched.
    assert_eq!(
        storage.list_files()?,
        vec!["chi_model", "clf_model", "tf_model"]
    );
    let persisted = PipelineArtifacts::load(storage.as_ref())?;
    assert_eq!(persisted.metadata().generation, report.generation);
    assert_eq!(
        coordinator.artifacts().unwrap().metadata().generation,
        report.generation
    );
    Ok(())
}

#[test]
fn test_failed_rename_keeps_previous_triple() -> Result<()> {
    let storage = Arc::new(FlakyStorage::default());
    let coordinator = PipelineCoordinator::new(
        PipelineConfig::default(),
        storage.clone(),
        Arc::new(StandardCleaner::new()),
    )?;
    let report = coordinator.train(&dataset(), 0.25)?;

    // The classifier is installed last, after the other two were renamed.
    storage.fail_rename.store(true, Ordering::SeqCst);
    assert!(matches!(
        coordinator.train(&dataset(), 0.25),
        Err(SvmTextError::Storage(_))
    ));

    assert_eq!(
        storage.list_files()?,
        vec!["chi_model", "clf_model", "tf_model"]
    );
    let persisted = PipelineArtifacts::load(storage.as_ref())?;
    assert_eq!(persisted.metadata().generation, report.generation);
    assert_eq!(
        coordinator.artifacts().unwrap().metadata().generation,
        report.generation
    );

    // Once storage recovers the next save replaces the whole triple.
    storage.fail_rename.store(false, Ordering::SeqCst);
    let retrained = coordinator.train(&dataset(), 0.25)?;
    assert_eq!(
        PipelineArtifacts::load(storage.as_ref())?.metadata().generation,
        retrained.generation
    );
    assert_eq!(storage.list_files()?.len(), 3);
    Ok(())
}

#[test]
fn test_failed_first_save_leaves_storage_empty() -> Result<()> {
    let storage = Arc::new(FlakyStorage::default());
    storage.fail_rename.store(true, Ordering::SeqCst);
    let coordinator = PipelineCoordinator::new(
        PipelineConfig::default(),
        storage.clone(),
        Arc::new(StandardCleaner::new()),
    )?;

    assert!(coordinator.train(&dataset(), 0.25).is_err());
    assert!(storage.list_files()?.is_empty());
    assert!(!coordinator.is_ready());
    Ok(())
}
