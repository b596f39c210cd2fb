//! Training, persistence and serving of the three-stage pipeline.
//!
//! - [`config`]: knobs for training and where artifacts live
//! - [`artifacts`]: the fitted triple and its on-disk format
//! - [`coordinator`]: the entry point that trains, reloads and predicts

pub mod artifacts;
pub mod config;
pub mod coordinator;

pub use artifacts::{
    ArtifactKind, ArtifactMetadata, ArtifactSummary, FORMAT_VERSION, PipelineArtifacts,
};
pub use config::{KernelKind, PipelineConfig};
pub use coordinator::{PipelineCoordinator, TrainingReport};
