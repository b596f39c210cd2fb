//! Command implementations for the svmtext CLI.

use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::analysis::cleaner::StandardCleaner;
use crate::cli::args::*;
use crate::cli::label_map::LabelMap;
use crate::cli::output::*;
use crate::dataset::load_labeled_pairs;
use crate::error::Result;
use crate::pipeline::artifacts::PipelineArtifacts;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::coordinator::PipelineCoordinator;
use crate::storage::file::FileStorage;
use crate::storage::traits::{Storage, StorageConfig};

/// Execute a CLI command.
pub fn execute_command(args: SvmTextArgs) -> Result<()> {
    match &args.command {
        Command::Train(train_args) => train(train_args, &args),
        Command::Predict(predict_args) => predict(predict_args, &args),
        Command::Inspect(inspect_args) => inspect(inspect_args, &args),
    }
}

fn open_storage(config: &PipelineConfig) -> Result<Arc<dyn Storage>> {
    let storage = FileStorage::new(&config.model_dir, StorageConfig::default())?;
    Ok(Arc::new(storage))
}

/// Train from the configured dataset and persist the model.
fn train(args: &TrainArgs, cli_args: &SvmTextArgs) -> Result<()> {
    let config = args.pipeline.resolve()?;
    info!("loading training data from {}", config.train_path.display());

    let start_time = Instant::now();
    let dataset = load_labeled_pairs(&config.train_path)?;
    let storage = open_storage(&config)?;
    let test_fraction = config.test_fraction;
    let model_dir = config.model_dir.to_string_lossy().to_string();

    let coordinator = PipelineCoordinator::new(config, storage, Arc::new(StandardCleaner::new()))?;
    let report = coordinator.train(&dataset, test_fraction)?;

    output_result(
        "Model trained successfully",
        &TrainingResult {
            accuracy: report.accuracy,
            feature_count: report.feature_count,
            vocabulary_size: report.vocabulary_size,
            train_size: report.train_size,
            test_size: report.test_size,
            classes: report.classes,
            generation: report.generation,
            model_dir,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Classify texts with the persisted model, training one if needed.
fn predict(args: &PredictArgs, cli_args: &SvmTextArgs) -> Result<()> {
    let config = args.pipeline.resolve()?;
    let label_map = match &args.label_map {
        Some(path) => LabelMap::from_file(path)?,
        None => LabelMap::default(),
    };

    let storage = open_storage(&config)?;
    let coordinator =
        PipelineCoordinator::load_or_train(config, storage, Arc::new(StandardCleaner::new()))?;
    let labels = coordinator.predict_batch(&args.texts)?;

    let predictions: Vec<PredictionResult> = args
        .texts
        .iter()
        .zip(labels)
        .map(|(text, label)| PredictionResult {
            category: label_map.category(label).to_string(),
            text: text.clone(),
            label,
        })
        .collect();

    output_predictions(&predictions, cli_args)
}

/// Describe the persisted model without training.
fn inspect(args: &InspectArgs, cli_args: &SvmTextArgs) -> Result<()> {
    let config = args.pipeline.resolve()?;
    let storage = open_storage(&config)?;
    let model_dir = config.model_dir.to_string_lossy().to_string();

    if !PipelineArtifacts::exists(storage.as_ref()) {
        return output_result(
            "No persisted model found",
            &ModelInfo {
                present: false,
                model_dir,
                generation: None,
                trained_at: None,
                format_version: None,
                vocabulary_size: None,
                feature_count: None,
                classes: None,
            },
            cli_args,
        );
    }

    let summary = PipelineArtifacts::load(storage.as_ref())?.summary();
    output_result(
        "Persisted model",
        &ModelInfo {
            present: true,
            model_dir,
            generation: Some(summary.generation),
            trained_at: Some(summary.trained_at),
            format_version: Some(summary.format_version),
            vocabulary_size: Some(summary.vocabulary_size),
            feature_count: Some(summary.feature_count),
            classes: Some(summary.classes),
        },
        cli_args,
    )
}
