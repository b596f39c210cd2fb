//! The three fitted stages of the classification pipeline.
//!
//! - [`TfIdfVectorizer`]: raw text to weighted sparse vectors
//! - [`Chi2Selector`]: weighted vectors to the k most class-dependent features
//! - [`LinearSvm`]: reduced vectors to labels
//!
//! Each stage exports its fitted state (`to_state`) and can be rebuilt from
//! it (`from_state`); the pipeline module persists those states together.

pub mod chi2;
pub mod sparse;
pub mod svm;
pub mod tfidf;

pub use chi2::{Chi2Selector, Chi2State, DEFAULT_FEATURE_RATIO};
pub use sparse::SparseVector;
pub use svm::{Hyperplane, LinearSvm, LinearSvmState, SvmParams};
pub use tfidf::{DEFAULT_TOKEN_PATTERN, TfIdfOptions, TfIdfState, TfIdfVectorizer};
