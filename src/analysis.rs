//! Text analysis collaborators for the classification pipeline.
//!
//! This module provides the text cleaner applied before vectorization and the
//! stop word loader. Both are pure functions of their input as far as the
//! pipeline is concerned.

pub mod cleaner;
pub mod stop_words;

pub use cleaner::{StandardCleaner, TextCleaner};
pub use stop_words::load_stopwords;
