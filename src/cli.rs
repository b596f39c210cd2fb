//! Command line interface for training and querying the classifier.

pub mod args;
pub mod commands;
pub mod label_map;
pub mod output;

// Re-export commonly used types
pub use args::*;
pub use commands::*;
pub use label_map::*;
pub use output::*;
