//! Labeled training data.
//!
//! A [`LabeledDataset`] is the ordered sequence of `(text, label)` pairs a
//! training run consumes. It is loaded once from a `text##label` file and is
//! immutable afterwards; splitting produces new datasets.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmTextError};

/// Categorical class code.
pub type Label = i64;

/// Column delimiter of the training file.
pub const FIELD_DELIMITER: &str = "##";

/// Ordered sequence of labeled documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabeledDataset {
    samples: Vec<(String, Label)>,
}

impl LabeledDataset {
    /// Create a dataset from `(text, label)` pairs.
    pub fn new(samples: Vec<(String, Label)>) -> Self {
        LabeledDataset { samples }
    }

    /// Create a dataset from borrowed pairs.
    pub fn from_pairs(pairs: &[(&str, Label)]) -> Self {
        LabeledDataset {
            samples: pairs
                .iter()
                .map(|(text, label)| (text.to_string(), *label))
                .collect(),
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the dataset has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over `(text, label)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Label)> {
        self.samples
            .iter()
            .map(|(text, label)| (text.as_str(), *label))
    }

    /// All texts in order.
    pub fn texts(&self) -> Vec<&str> {
        self.samples.iter().map(|(text, _)| text.as_str()).collect()
    }

    /// All labels in order.
    pub fn labels(&self) -> Vec<Label> {
        self.samples.iter().map(|(_, label)| *label).collect()
    }

    /// Distinct labels, ascending.
    pub fn classes(&self) -> BTreeSet<Label> {
        self.samples.iter().map(|(_, label)| *label).collect()
    }

    /// Split into `(train, test)` partitions.
    ///
    /// Each class is shuffled with a generator seeded from `seed` and
    /// `round(n_class * test_fraction)` of its samples are held out, keeping
    /// at least one sample of every class in the training partition. Both
    /// partitions preserve the original sample order.
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<(LabeledDataset, LabeledDataset)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(SvmTextError::invalid_config(format!(
                "test_fraction must be in (0, 1), got {test_fraction}"
            )));
        }

        let mut by_class: BTreeMap<Label, Vec<usize>> = BTreeMap::new();
        for (idx, (_, label)) in self.samples.iter().enumerate() {
            by_class.entry(*label).or_default().push(idx);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_indices = Vec::with_capacity(self.samples.len());
        let mut test_indices = Vec::new();

        for indices in by_class.values_mut() {
            indices.shuffle(&mut rng);
            let n = indices.len();
            let n_test = ((n as f64 * test_fraction).round() as usize).min(n - 1);
            test_indices.extend_from_slice(&indices[..n_test]);
            train_indices.extend_from_slice(&indices[n_test..]);
        }

        train_indices.sort_unstable();
        test_indices.sort_unstable();

        Ok((self.select(&train_indices), self.select(&test_indices)))
    }

    fn select(&self, indices: &[usize]) -> LabeledDataset {
        LabeledDataset {
            samples: indices.iter().map(|&i| self.samples[i].clone()).collect(),
        }
    }
}

impl FromIterator<(String, Label)> for LabeledDataset {
    fn from_iter<I: IntoIterator<Item = (String, Label)>>(iter: I) -> Self {
        LabeledDataset {
            samples: iter.into_iter().collect(),
        }
    }
}

/// Load a `text##label` training file.
///
/// The file is UTF-8 without a header row. Blank lines are skipped. A line
/// must contain exactly one delimiter and its label must parse as an integer
/// class code.
pub fn load_labeled_pairs<P: AsRef<Path>>(path: P) -> Result<LabeledDataset> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        SvmTextError::data_load(format!("cannot open {}: {e}", path.display()))
    })?;
    let reader = BufReader::new(file);

    let mut samples = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            SvmTextError::data_load(format!("line {}: {e}", line_num + 1))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        samples.push(parse_line(&line, line_num + 1)?);
    }

    if samples.is_empty() {
        return Err(SvmTextError::data_load(format!(
            "{} contains no labeled rows",
            path.display()
        )));
    }

    Ok(LabeledDataset::new(samples))
}

fn parse_line(line: &str, line_num: usize) -> Result<(String, Label)> {
    let (text, label) = line.split_once(FIELD_DELIMITER).ok_or_else(|| {
        SvmTextError::data_load(format!("line {line_num}: missing '{FIELD_DELIMITER}' delimiter"))
    })?;
    if label.contains(FIELD_DELIMITER) {
        return Err(SvmTextError::data_load(format!(
            "line {line_num}: more than one '{FIELD_DELIMITER}' delimiter"
        )));
    }
    let label = label.trim().parse::<Label>().map_err(|e| {
        SvmTextError::data_load(format!("line {line_num}: invalid label {label:?}: {e}"))
    })?;
    Ok((text.to_string(), label))
}
