//! Error types for the svmtext library.
//!
//! All fallible operations return [`SvmTextError`] through the crate-wide
//! [`Result`] alias. The variants follow the failure taxonomy of the
//! training/inference pipeline: data loading, invalid input, stage ordering,
//! artifact loading and model readiness.
//!
//! # Examples
//!
//! ```
//! use svmtext::error::{Result, SvmTextError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(SvmTextError::invalid_input("labels contain a single class"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for svmtext operations.
#[derive(Error, Debug)]
pub enum SvmTextError {
    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Training data missing, malformed or empty.
    #[error("Data load error: {0}")]
    DataLoad(String),

    /// Input that violates a stage precondition (single class, negative weights, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stage was used before it was fitted.
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// A persisted artifact is missing, corrupt or inconsistent with its siblings.
    #[error("Artifact load error: {0}")]
    ArtifactLoad(String),

    /// Prediction requested while no artifacts are loaded.
    #[error("Model not ready: {0}")]
    ModelNotReady(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for operations that may fail with SvmTextError.
pub type Result<T> = std::result::Result<T, SvmTextError>;

impl SvmTextError {
    /// Create a new data load error.
    pub fn data_load<S: Into<String>>(msg: S) -> Self {
        SvmTextError::DataLoad(msg.into())
    }

    /// Create a new invalid input error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        SvmTextError::InvalidInput(msg.into())
    }

    /// Create a new not fitted error.
    pub fn not_fitted<S: Into<String>>(msg: S) -> Self {
        SvmTextError::NotFitted(msg.into())
    }

    /// Create a new artifact load error.
    pub fn artifact_load<S: Into<String>>(msg: S) -> Self {
        SvmTextError::ArtifactLoad(msg.into())
    }

    /// Create a new model not ready error.
    pub fn model_not_ready<S: Into<String>>(msg: S) -> Self {
        SvmTextError::ModelNotReady(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        SvmTextError::Storage(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        SvmTextError::InvalidConfig(msg.into())
    }
}
