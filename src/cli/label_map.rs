//! Presentation names for label codes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::Label;
use crate::error::{Result, SvmTextError};

/// Name printed for labels missing from the map.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Lookup table from label code to category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap {
    categories: BTreeMap<Label, String>,
}

impl Default for LabelMap {
    fn default() -> Self {
        LabelMap {
            categories: BTreeMap::from([(0, "loan".to_string()), (1, "not_loan".to_string())]),
        }
    }
}

impl LabelMap {
    /// Build a map from explicit entries.
    pub fn new(categories: BTreeMap<Label, String>) -> Self {
        LabelMap { categories }
    }

    /// Load a JSON object such as `{"0": "loan", "1": "not_loan"}`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SvmTextError::invalid_config(format!(
                "cannot read label map {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let categories: BTreeMap<Label, String> = serde_json::from_str(&content)?;
        Ok(LabelMap::new(categories))
    }

    /// Category name of `label`, or [`UNKNOWN_CATEGORY`].
    pub fn category(&self, label: Label) -> &str {
        self.categories
            .get(&label)
            .map_or(UNKNOWN_CATEGORY, String::as_str)
    }
}
