//! Storage abstraction layer for persisted model artifacts.
//!
//! Artifacts are named blobs. [`FileStorage`] keeps them as files under a
//! model directory; [`MemoryStorage`] keeps them in a map and backs the
//! tests. Both expose the same [`Storage`] trait, so the pipeline never
//! touches the filesystem directly.

pub mod file;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use file::*;
pub use memory::*;
pub use traits::*;
