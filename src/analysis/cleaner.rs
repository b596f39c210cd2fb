//! Text cleaner implementation.
//!
//! The cleaner normalizes raw text into a lowercase, punctuation-stripped
//! string before it reaches the vectorizer. Word boundaries follow the Unicode
//! Text Segmentation algorithm (UAX #29), so international text is handled the
//! same way as ASCII.
//!
//! # Examples
//!
//! ```
//! use svmtext::analysis::cleaner::{StandardCleaner, TextCleaner};
//!
//! let cleaner = StandardCleaner::new();
//! assert_eq!(cleaner.clean("Need a LOAN, now!"), "need a loan now");
//! ```

use unicode_segmentation::UnicodeSegmentation;

/// Trait for text cleaners.
///
/// Implementations must be deterministic: the same input always yields the
/// same output, because training and serving share one cleaner.
pub trait TextCleaner: Send + Sync + std::fmt::Debug {
    /// Normalize raw text.
    fn clean(&self, text: &str) -> String;

    /// Get the name of this cleaner for debugging and logging.
    fn name(&self) -> &str;
}

/// A cleaner that keeps Unicode words, lowercased and joined by single spaces.
#[derive(Clone, Debug, Default)]
pub struct StandardCleaner;

impl StandardCleaner {
    /// Create a new standard cleaner.
    pub fn new() -> Self {
        StandardCleaner
    }
}

impl TextCleaner for StandardCleaner {
    fn clean(&self, text: &str) -> String {
        let mut cleaned = String::with_capacity(text.len());
        for word in text.unicode_words() {
            if !cleaned.is_empty() {
                cleaned.push(' ');
            }
            cleaned.push_str(&word.to_lowercase());
        }
        cleaned
    }

    fn name(&self) -> &str {
        "standard"
    }
}
