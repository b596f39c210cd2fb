//! TF-IDF vectorizer for text feature extraction.
//!
//! The vectorizer learns a unigram vocabulary and per-term inverse document
//! frequencies from training documents, then maps any document to a sparse,
//! non-negative, L2-normalized vector over that frozen vocabulary. Terms that
//! were not seen during fitting contribute nothing.

use std::collections::HashSet;

use ahash::AHashMap;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmTextError};
use crate::ml::sparse::SparseVector;

/// Default token pattern: runs of two or more word characters.
pub const DEFAULT_TOKEN_PATTERN: &str = r"(?u)\b\w\w+\b";

/// Weighting options fixed at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfOptions {
    /// Regular expression selecting tokens from lowercased text.
    pub token_pattern: String,
    /// Count every present term once.
    pub binary: bool,
    /// Replace tf with `1 + ln(tf)`.
    pub sublinear_tf: bool,
    /// Use `ln((1 + N) / (1 + df)) + 1` instead of `ln(N / df) + 1`.
    pub smooth_idf: bool,
    /// Scale every output vector to unit Euclidean norm.
    pub l2_norm: bool,
}

impl Default for TfIdfOptions {
    fn default() -> Self {
        TfIdfOptions {
            token_pattern: DEFAULT_TOKEN_PATTERN.to_string(),
            binary: true,
            sublinear_tf: true,
            smooth_idf: true,
            l2_norm: true,
        }
    }
}

/// Fitted vectorizer state as persisted in the `tf_model` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfState {
    pub options: TfIdfOptions,
    /// Vocabulary terms; a term's position is its feature index.
    pub terms: Vec<String>,
    /// Inverse document frequency per feature index.
    pub idf: Vec<f64>,
    /// Number of documents seen while fitting.
    pub n_documents: usize,
}

/// TF-IDF vectorizer for text feature extraction.
pub struct TfIdfVectorizer {
    options: TfIdfOptions,
    pattern: Regex,
    /// Terms dropped before counting; only consulted while fitting.
    stop_words: HashSet<String>,
    /// Vocabulary: term -> index mapping.
    vocabulary: AHashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
    n_documents: usize,
}

impl std::fmt::Debug for TfIdfVectorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfIdfVectorizer")
            .field("options", &self.options)
            .field("vocabulary_size", &self.terms.len())
            .field("n_documents", &self.n_documents)
            .field("stop_words", &self.stop_words.len())
            .finish()
    }
}

impl TfIdfVectorizer {
    /// Create an unfitted vectorizer.
    pub fn new(options: TfIdfOptions) -> Result<Self> {
        let pattern = compile_pattern(&options.token_pattern)?;
        Ok(TfIdfVectorizer {
            options,
            pattern,
            stop_words: HashSet::new(),
            vocabulary: AHashMap::new(),
            terms: Vec::new(),
            idf: Vec::new(),
            n_documents: 0,
        })
    }

    /// Drop these terms from the vocabulary when fitting.
    pub fn with_stop_words(mut self, stop_words: HashSet<String>) -> Self {
        self.stop_words = stop_words;
        self
    }

    /// Fit the vectorizer on training documents.
    ///
    /// Every distinct token becomes a dimension. Indices are assigned in
    /// lexicographic term order so the same corpus always yields the same
    /// feature space.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        if documents.is_empty() {
            return Err(SvmTextError::invalid_input(
                "cannot fit vectorizer on an empty document set",
            ));
        }

        let mut document_frequency: AHashMap<String, usize> = AHashMap::new();
        for doc in documents {
            let unique_tokens: HashSet<String> = self
                .tokenize(doc.as_ref())
                .into_iter()
                .filter(|token| !self.stop_words.contains(token))
                .collect();
            for token in unique_tokens {
                *document_frequency.entry(token).or_insert(0) += 1;
            }
        }

        if document_frequency.is_empty() {
            return Err(SvmTextError::invalid_input(
                "empty vocabulary; documents contain only stop words or no tokens",
            ));
        }

        let mut terms: Vec<String> = document_frequency.keys().cloned().collect();
        terms.sort_unstable();

        let n_documents = documents.len();
        let idf = terms
            .iter()
            .map(|term| {
                let df = document_frequency.get(term).copied().unwrap_or(0);
                inverse_document_frequency(n_documents, df, self.options.smooth_idf)
            })
            .collect();

        self.vocabulary = index_terms(&terms);
        self.terms = terms;
        self.idf = idf;
        self.n_documents = n_documents;

        Ok(())
    }

    /// Fit on the documents, then transform them.
    pub fn fit_transform<S: AsRef<str> + Sync>(
        &mut self,
        documents: &[S],
    ) -> Result<Vec<SparseVector>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    /// Transform documents into weighted vectors over the fitted vocabulary.
    pub fn transform<S: AsRef<str> + Sync>(&self, documents: &[S]) -> Result<Vec<SparseVector>> {
        self.check_fitted()?;
        Ok(documents
            .par_iter()
            .map(|doc| self.vectorize(doc.as_ref()))
            .collect())
    }

    /// Transform a single document.
    pub fn transform_one(&self, document: &str) -> Result<SparseVector> {
        self.check_fitted()?;
        Ok(self.vectorize(document))
    }

    fn vectorize(&self, document: &str) -> SparseVector {
        let mut counts: AHashMap<usize, usize> = AHashMap::new();
        for token in self.tokenize(document) {
            if let Some(&idx) = self.vocabulary.get(&token) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }

        let entries = counts
            .into_iter()
            .map(|(idx, count)| {
                let mut tf = if self.options.binary { 1.0 } else { count as f64 };
                if self.options.sublinear_tf {
                    tf = 1.0 + tf.ln();
                }
                (idx, tf * self.idf[idx])
            })
            .collect();

        let mut vector = SparseVector::from_entries(self.terms.len(), entries)
            .unwrap_or_else(|| SparseVector::zeros(self.terms.len()));
        if self.options.l2_norm {
            vector.normalize();
        }
        vector
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn check_fitted(&self) -> Result<()> {
        if self.terms.is_empty() {
            Err(SvmTextError::not_fitted(
                "TfIdfVectorizer::transform called before fit",
            ))
        } else {
            Ok(())
        }
    }

    /// Whether `fit` has completed.
    pub fn is_fitted(&self) -> bool {
        !self.terms.is_empty()
    }

    /// Get the size of the vocabulary.
    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    /// Feature index of a term, if it is in the vocabulary.
    pub fn feature_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    /// Vocabulary terms ordered by feature index.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Inverse document frequencies ordered by feature index.
    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Export the fitted state.
    pub fn to_state(&self) -> Result<TfIdfState> {
        self.check_fitted()?;
        Ok(TfIdfState {
            options: self.options.clone(),
            terms: self.terms.clone(),
            idf: self.idf.clone(),
            n_documents: self.n_documents,
        })
    }

    /// Rebuild a fitted vectorizer from persisted state.
    pub fn from_state(state: TfIdfState) -> Result<Self> {
        if state.terms.is_empty() {
            return Err(SvmTextError::artifact_load("vectorizer has an empty vocabulary"));
        }
        if state.terms.len() != state.idf.len() {
            return Err(SvmTextError::artifact_load(format!(
                "vectorizer has {} terms but {} idf weights",
                state.terms.len(),
                state.idf.len()
            )));
        }
        if state.idf.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(SvmTextError::artifact_load(
                "vectorizer idf weights must be finite and non-negative",
            ));
        }

        let vocabulary = index_terms(&state.terms);
        if vocabulary.len() != state.terms.len() {
            return Err(SvmTextError::artifact_load("vectorizer vocabulary has duplicate terms"));
        }

        let pattern = compile_pattern(&state.options.token_pattern)
            .map_err(|e| SvmTextError::artifact_load(e.to_string()))?;

        Ok(TfIdfVectorizer {
            options: state.options,
            pattern,
            stop_words: HashSet::new(),
            vocabulary,
            terms: state.terms,
            idf: state.idf,
            n_documents: state.n_documents,
        })
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| SvmTextError::invalid_config(format!("invalid token pattern: {e}")))
}

fn index_terms(terms: &[String]) -> AHashMap<String, usize> {
    terms
        .iter()
        .enumerate()
        .map(|(idx, term)| (term.clone(), idx))
        .collect()
}

fn inverse_document_frequency(n_documents: usize, df: usize, smooth: bool) -> f64 {
    if smooth {
        ((n_documents as f64 + 1.0) / (df as f64 + 1.0)).ln() + 1.0
    } else {
        (n_documents as f64 / df.max(1) as f64).ln() + 1.0
    }
}
