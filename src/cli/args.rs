//! Command line argument parsing for the svmtext CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::config::PipelineConfig;

/// svmtext - short-text classification with TF-IDF, chi-squared and a linear SVM
#[derive(Parser, Debug, Clone)]
#[command(name = "svmtext")]
#[command(about = "Train and serve a TF-IDF + chi-squared + linear SVM text classifier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct SvmTextArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl SvmTextArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train the pipeline from the configured dataset and persist it
    Train(TrainArgs),

    /// Classify texts, training first if no usable model is persisted
    Predict(PredictArgs),

    /// Show metadata of the persisted model
    Inspect(InspectArgs),
}

/// Pipeline settings shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineOptions {
    /// JSON configuration file; flags below override its values
    #[arg(long, value_name = "CONFIG_FILE", env = "SVMTEXT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Training file in `text##label` format
    #[arg(long, value_name = "TRAIN_FILE")]
    pub train_path: Option<PathBuf>,

    /// Stop word file, one token per line
    #[arg(long, value_name = "STOP_FILE")]
    pub stop_path: Option<PathBuf>,

    /// Directory holding the persisted model
    #[arg(long, value_name = "MODEL_DIR", env = "SVMTEXT_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Share of the dataset held out for evaluation
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Share of the vocabulary kept by feature selection
    #[arg(long)]
    pub feature_ratio: Option<f64>,

    /// Seed for the split and the solver
    #[arg(long)]
    pub seed: Option<u64>,

    /// Drop stop words when fitting the vectorizer
    #[arg(long)]
    pub use_stopwords: bool,
}

impl PipelineOptions {
    /// Build the effective configuration: file (or defaults), then flags.
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(path) = &self.train_path {
            config.train_path = path.clone();
        }
        if let Some(path) = &self.stop_path {
            config.stop_path = Some(path.clone());
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(fraction) = self.test_fraction {
            config.test_fraction = fraction;
        }
        if let Some(ratio) = self.feature_ratio {
            config.feature_ratio = ratio;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.use_stopwords {
            config.use_stopwords = true;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub pipeline: PipelineOptions,
}

/// Arguments for prediction
#[derive(Parser, Debug, Clone)]
pub struct PredictArgs {
    /// Texts to classify
    #[arg(value_name = "TEXT", required = true)]
    pub texts: Vec<String>,

    /// JSON object mapping label codes to category names
    #[arg(long, value_name = "LABEL_MAP_FILE")]
    pub label_map: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineOptions,
}

/// Arguments for inspecting the persisted model
#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub pipeline: PipelineOptions,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
