//! # svmtext
//!
//! Short-text classification with a classical supervised pipeline.
//!
//! ## Features
//!
//! - TF-IDF term weighting with a deterministic vocabulary
//! - Chi-squared feature selection
//! - Linear SVM trained by dual coordinate descent
//! - Versioned, checksummed artifacts saved and reloaded as one unit
//! - Pluggable storage backends

pub mod analysis;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod ml;
pub mod pipeline;
pub mod storage;

pub mod prelude {
    pub use crate::analysis::{StandardCleaner, TextCleaner};
    pub use crate::dataset::{Label, LabeledDataset, load_labeled_pairs};
    pub use crate::error::{Result, SvmTextError};
    pub use crate::pipeline::{PipelineConfig, PipelineCoordinator, TrainingReport};
    pub use crate::storage::{FileStorage, MemoryStorage, Storage};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
