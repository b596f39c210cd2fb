//! Stop word list loading.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

/// Load a stop word file: UTF-8, one token per line.
///
/// Lines are whitespace-trimmed and lowercased to match the vectorizer's
/// tokens; blank lines are skipped. Duplicates collapse into a single entry.
pub fn load_stopwords<P: AsRef<Path>>(path: P) -> Result<HashSet<String>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut stop_words = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        let word = line.trim();
        if !word.is_empty() {
            stop_words.insert(word.to_lowercase());
        }
    }

    Ok(stop_words)
}
