//! The fitted artifact triple and its persistence format.
//!
//! [`PipelineArtifacts`] owns the vectorizer, selector and classifier as one
//! unit. Construction checks that the three stages share one feature space;
//! saving writes all three blobs or none; loading either yields a complete,
//! consistent triple or fails with [`SvmTextError::ArtifactLoad`].
//!
//! Each blob is a JSON envelope:
//!
//! ```json
//! {"format_version": 1, "kind": "vectorizer", "generation": "<uuid>",
//!  "trained_at": "<rfc3339>", "checksum": 123, "payload": "<state json>"}
//! ```
//!
//! The payload is the stage state serialized as JSON text; `checksum` is its
//! CRC-32. All three envelopes of one training run carry the same
//! `generation`, so a directory holding blobs from different runs is rejected.

use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::Label;
use crate::error::{Result, SvmTextError};
use crate::ml::chi2::{Chi2Selector, Chi2State};
use crate::ml::svm::{LinearSvm, LinearSvmState};
use crate::ml::tfidf::{TfIdfState, TfIdfVectorizer};
use crate::storage::traits::{Storage, read_to_string};

/// Version of the envelope and payload schema written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Which stage a blob holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Vectorizer,
    Selector,
    Classifier,
}

impl ArtifactKind {
    /// All kinds, in load order.
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Vectorizer,
        ArtifactKind::Selector,
        ArtifactKind::Classifier,
    ];

    /// Blob name under the model directory.
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::Vectorizer => "tf_model",
            ArtifactKind::Selector => "chi_model",
            ArtifactKind::Classifier => "clf_model",
        }
    }

    /// Name the live blob is moved to while a new triple is committed.
    pub fn backup_name(self) -> &'static str {
        match self {
            ArtifactKind::Vectorizer => "tf_model.bak",
            ArtifactKind::Selector => "chi_model.bak",
            ArtifactKind::Classifier => "clf_model.bak",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    kind: ArtifactKind,
    generation: Uuid,
    trained_at: DateTime<Utc>,
    checksum: u32,
    payload: String,
}

/// Identity of one training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub generation: Uuid,
    pub trained_at: DateTime<Utc>,
}

impl ArtifactMetadata {
    fn fresh() -> Self {
        ArtifactMetadata {
            generation: Uuid::new_v4(),
            trained_at: Utc::now(),
        }
    }
}

/// Human-readable description of a loaded triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub format_version: u32,
    pub generation: Uuid,
    pub trained_at: DateTime<Utc>,
    pub vocabulary_size: usize,
    pub feature_count: usize,
    pub classes: Vec<Label>,
}

/// The three fitted stages, always consistent with each other.
#[derive(Debug)]
pub struct PipelineArtifacts {
    metadata: ArtifactMetadata,
    vectorizer: TfIdfVectorizer,
    selector: Chi2Selector,
    classifier: LinearSvm,
}

impl PipelineArtifacts {
    /// Bundle freshly fitted stages under a new generation id.
    ///
    /// Fails with `NotFitted` if a stage is unfitted and with `InvalidInput`
    /// if the stages disagree on dimensions.
    pub fn new(
        vectorizer: TfIdfVectorizer,
        selector: Chi2Selector,
        classifier: LinearSvm,
    ) -> Result<Self> {
        check_dimensions(&vectorizer, &selector, &classifier)?;
        Ok(PipelineArtifacts {
            metadata: ArtifactMetadata::fresh(),
            vectorizer,
            selector,
            classifier,
        })
    }

    /// Run the frozen pipeline on one already-cleaned text.
    pub fn predict(&self, cleaned_text: &str) -> Result<Label> {
        let weighted = self.vectorizer.transform_one(cleaned_text)?;
        let reduced = self.selector.transform_one(&weighted)?;
        self.classifier.predict(&reduced)
    }

    /// Run the frozen pipeline on many already-cleaned texts.
    pub fn predict_many<S: AsRef<str> + Sync>(&self, cleaned_texts: &[S]) -> Result<Vec<Label>> {
        let weighted = self.vectorizer.transform(cleaned_texts)?;
        let reduced = self.selector.transform(&weighted)?;
        self.classifier.predict_batch(&reduced)
    }

    /// Training run identity.
    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    /// The fitted vectorizer.
    pub fn vectorizer(&self) -> &TfIdfVectorizer {
        &self.vectorizer
    }

    /// The fitted selector.
    pub fn selector(&self) -> &Chi2Selector {
        &self.selector
    }

    /// The fitted classifier.
    pub fn classifier(&self) -> &LinearSvm {
        &self.classifier
    }

    /// Describe this triple.
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            format_version: FORMAT_VERSION,
            generation: self.metadata.generation,
            trained_at: self.metadata.trained_at,
            vocabulary_size: self.vectorizer.vocabulary_size(),
            feature_count: self.selector.selected().map_or(0, |s| s.len()),
            classes: self.classifier.classes().map(|c| c.to_vec()).unwrap_or_default(),
        }
    }

    /// Persist all three blobs.
    ///
    /// Every blob is first written and synced to a temporary file. Only when
    /// all three temporaries exist is the live triple moved aside to backups
    /// and the temporaries renamed into place. If any step fails, the blobs
    /// already installed are rolled back from the backups, the temporaries are
    /// removed and the previous triple stays in place.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let payloads = [
            (ArtifactKind::Vectorizer, serde_json::to_string(&self.vectorizer.to_state()?)?),
            (ArtifactKind::Selector, serde_json::to_string(&self.selector.to_state()?)?),
            (ArtifactKind::Classifier, serde_json::to_string(&self.classifier.to_state()?)?),
        ];

        let mut temps: Vec<(String, ArtifactKind)> = Vec::with_capacity(payloads.len());
        if let Err(e) = self.write_temporaries(storage, payloads, &mut temps) {
            discard(storage, &temps);
            return Err(e);
        }

        if let Err(e) = commit(storage, &temps) {
            discard(storage, &temps);
            return Err(e);
        }

        storage.sync()
    }

    fn write_temporaries(
        &self,
        storage: &dyn Storage,
        payloads: [(ArtifactKind, String); 3],
        temps: &mut Vec<(String, ArtifactKind)>,
    ) -> Result<()> {
        for (kind, payload) in payloads {
            let (temp_name, mut output) = storage.create_temp_output(kind.file_name())?;
            temps.push((temp_name, kind));

            let envelope = ArtifactEnvelope {
                format_version: FORMAT_VERSION,
                kind,
                generation: self.metadata.generation,
                trained_at: self.metadata.trained_at,
                checksum: crc32fast::hash(payload.as_bytes()),
                payload,
            };
            serde_json::to_writer(&mut output, &envelope)?;
            output.flush_and_sync()?;
            output.close()?;
        }
        Ok(())
    }

    /// Load a complete triple.
    ///
    /// Any missing, unreadable, corrupt, mismatched or inconsistent blob
    /// fails the whole load with `ArtifactLoad`.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let (tf_meta, tf_state): (_, TfIdfState) = read_artifact(storage, ArtifactKind::Vectorizer)?;
        let (chi_meta, chi_state): (_, Chi2State) = read_artifact(storage, ArtifactKind::Selector)?;
        let (clf_meta, clf_state): (_, LinearSvmState) =
            read_artifact(storage, ArtifactKind::Classifier)?;

        if tf_meta != chi_meta || tf_meta != clf_meta {
            return Err(SvmTextError::artifact_load(format!(
                "artifacts come from different training runs ({}, {}, {})",
                tf_meta.generation, chi_meta.generation, clf_meta.generation
            )));
        }

        let vectorizer = TfIdfVectorizer::from_state(tf_state).map_err(as_artifact_error)?;
        let selector = Chi2Selector::from_state(chi_state).map_err(as_artifact_error)?;
        let classifier = LinearSvm::from_state(clf_state).map_err(as_artifact_error)?;
        check_dimensions(&vectorizer, &selector, &classifier).map_err(as_artifact_error)?;

        Ok(PipelineArtifacts {
            metadata: tf_meta,
            vectorizer,
            selector,
            classifier,
        })
    }

    /// Whether all three blob names are present.
    pub fn exists(storage: &dyn Storage) -> bool {
        ArtifactKind::ALL
            .iter()
            .all(|kind| storage.file_exists(kind.file_name()))
    }
}

fn read_artifact<T: DeserializeOwned>(
    storage: &dyn Storage,
    kind: ArtifactKind,
) -> Result<(ArtifactMetadata, T)> {
    let name = kind.file_name();
    let content = read_to_string(storage, name)
        .map_err(|e| SvmTextError::artifact_load(format!("{name}: {e}")))?;
    let envelope: ArtifactEnvelope = serde_json::from_str(&content)
        .map_err(|e| SvmTextError::artifact_load(format!("{name}: malformed envelope: {e}")))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(SvmTextError::artifact_load(format!(
            "{name}: unsupported format version {} (expected {FORMAT_VERSION})",
            envelope.format_version
        )));
    }
    if envelope.kind != kind {
        return Err(SvmTextError::artifact_load(format!(
            "{name}: holds a {:?} artifact, expected {kind:?}",
            envelope.kind
        )));
    }
    if crc32fast::hash(envelope.payload.as_bytes()) != envelope.checksum {
        return Err(SvmTextError::artifact_load(format!("{name}: checksum mismatch")));
    }

    let state = serde_json::from_str(&envelope.payload)
        .map_err(|e| SvmTextError::artifact_load(format!("{name}: malformed payload: {e}")))?;
    let metadata = ArtifactMetadata {
        generation: envelope.generation,
        trained_at: envelope.trained_at,
    };
    Ok((metadata, state))
}

fn check_dimensions(
    vectorizer: &TfIdfVectorizer,
    selector: &Chi2Selector,
    classifier: &LinearSvm,
) -> Result<()> {
    if !vectorizer.is_fitted() {
        return Err(SvmTextError::not_fitted("vectorizer"));
    }
    let selector_in = selector
        .n_features_in()
        .ok_or_else(|| SvmTextError::not_fitted("selector"))?;
    let selector_out = selector.selected().map_or(0, |s| s.len());
    let classifier_in = classifier
        .n_features()
        .ok_or_else(|| SvmTextError::not_fitted("classifier"))?;

    if vectorizer.vocabulary_size() != selector_in {
        return Err(SvmTextError::invalid_input(format!(
            "vectorizer produces {} features but selector was fit on {selector_in}",
            vectorizer.vocabulary_size()
        )));
    }
    if selector_out != classifier_in {
        return Err(SvmTextError::invalid_input(format!(
            "selector keeps {selector_out} features but classifier was fit on {classifier_in}"
        )));
    }
    Ok(())
}

fn as_artifact_error(err: SvmTextError) -> SvmTextError {
    match err {
        SvmTextError::ArtifactLoad(_) => err,
        other => SvmTextError::artifact_load(other.to_string()),
    }
}

/// Swap the temporaries in for the live blobs, all or none.
fn commit(storage: &dyn Storage, temps: &[(String, ArtifactKind)]) -> Result<()> {
    let mut backed_up: Vec<ArtifactKind> = Vec::with_capacity(temps.len());
    let mut installed: Vec<ArtifactKind> = Vec::with_capacity(temps.len());

    let result = install(storage, temps, &mut backed_up, &mut installed);
    match result {
        Ok(()) => {
            for kind in &backed_up {
                if let Err(e) = storage.delete_file(kind.backup_name()) {
                    warn!("cannot remove backup {}: {e}", kind.backup_name());
                }
            }
            Ok(())
        }
        Err(e) => {
            rollback(storage, &backed_up, &installed);
            Err(e)
        }
    }
}

fn install(
    storage: &dyn Storage,
    temps: &[(String, ArtifactKind)],
    backed_up: &mut Vec<ArtifactKind>,
    installed: &mut Vec<ArtifactKind>,
) -> Result<()> {
    for &(_, kind) in temps {
        if storage.file_exists(kind.file_name()) {
            storage.rename_file(kind.file_name(), kind.backup_name())?;
            backed_up.push(kind);
        }
    }
    for (temp_name, kind) in temps {
        storage.rename_file(temp_name, kind.file_name())?;
        installed.push(*kind);
    }
    Ok(())
}

fn rollback(storage: &dyn Storage, backed_up: &[ArtifactKind], installed: &[ArtifactKind]) {
    for kind in installed {
        if !backed_up.contains(kind) {
            let _ = storage.delete_file(kind.file_name());
        }
    }
    for kind in backed_up {
        if let Err(e) = storage.rename_file(kind.backup_name(), kind.file_name()) {
            warn!("cannot restore {} from backup: {e}", kind.file_name());
        }
    }
}

fn discard(storage: &dyn Storage, temps: &[(String, ArtifactKind)]) {
    for (temp_name, _) in temps {
        let _ = storage.delete_file(temp_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::svm::SvmParams;
    use crate::ml::tfidf::TfIdfOptions;
    use crate::storage::memory::MemoryStorage;

    fn fitted_artifacts() -> PipelineArtifacts {
        let texts = ["need loan now", "please lend money", "not interested", "no thanks bye"];
        let labels = [0, 0, 1, 1];

        let mut vectorizer = TfIdfVectorizer::new(TfIdfOptions::default()).unwrap();
        let weighted = vectorizer.fit_transform(&texts).unwrap();
        let mut selector = Chi2Selector::new(0.5).unwrap();
        selector.fit(&weighted, &labels).unwrap();
        let reduced = selector.transform(&weighted).unwrap();
        let mut classifier = LinearSvm::new(SvmParams::default(), 42).unwrap();
        classifier.fit(&reduced, &labels).unwrap();

        PipelineArtifacts::new(vectorizer, selector, classifier).unwrap()
    }

    #[test]
    fn test_file_names() {
        let names: Vec<_> = ArtifactKind::ALL.iter().map(|k| k.file_name()).collect();
        assert_eq!(names, vec!["tf_model", "chi_model", "clf_model"]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let storage = MemoryStorage::new();
        let artifacts = fitted_artifacts();
        artifacts.save(&storage).unwrap();

        assert_eq!(
            storage.list_files().unwrap(),
            vec!["chi_model", "clf_model", "tf_model"]
        );

        let loaded = PipelineArtifacts::load(&storage).unwrap();
        assert_eq!(loaded.metadata(), artifacts.metadata());
        assert_eq!(loaded.summary(), artifacts.summary());
        for text in ["need money", "no thanks", "", "unrelated words"] {
            assert_eq!(loaded.predict(text).unwrap(), artifacts.predict(text).unwrap());
        }
    }

    #[test]
    fn test_missing_blob_fails_closed() {
        let storage = MemoryStorage::new();
        fitted_artifacts().save(&storage).unwrap();
        storage.delete_file("chi_model").unwrap();

        assert!(!PipelineArtifacts::exists(&storage));
        assert!(matches!(
            PipelineArtifacts::load(&storage),
            Err(SvmTextError::ArtifactLoad(_))
        ));
    }

    #[test]
    fn test_mixed_generations_are_rejected() {
        let first = MemoryStorage::new();
        fitted_artifacts().save(&first).unwrap();
        let second = MemoryStorage::new();
        fitted_artifacts().save(&second).unwrap();

        let foreign = read_to_string(&second, "clf_model").unwrap();
        first.put("clf_model", foreign.as_bytes());

        match PipelineArtifacts::load(&first) {
            Err(SvmTextError::ArtifactLoad(msg)) => assert!(msg.contains("different training runs")),
            other => panic!("Expected ArtifactLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_payload_is_rejected() {
        let storage = MemoryStorage::new();
        fitted_artifacts().save(&storage).unwrap();

        let content = read_to_string(&storage, "tf_model").unwrap();
        let mut envelope: serde_json::Value = serde_json::from_str(&content).unwrap();
        let payload = envelope["payload"].as_str().unwrap().replacen("need", "nead", 1);
        envelope["payload"] = serde_json::Value::String(payload);
        storage.put("tf_model", envelope.to_string().as_bytes());

        match PipelineArtifacts::load(&storage) {
            Err(SvmTextError::ArtifactLoad(msg)) => assert!(msg.contains("checksum")),
            other => panic!("Expected ArtifactLoad, got {other:?}"),
        }

        storage.put("tf_model", b"not json");
        assert!(matches!(
            PipelineArtifacts::load(&storage),
            Err(SvmTextError::ArtifactLoad(_))
        ));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let storage = MemoryStorage::new();
        fitted_artifacts().save(&storage).unwrap();

        let content = read_to_string(&storage, "clf_model").unwrap();
        let mut envelope: serde_json::Value = serde_json::from_str(&content).unwrap();
        envelope["format_version"] = serde_json::json!(FORMAT_VERSION + 1);
        storage.put("clf_model", envelope.to_string().as_bytes());

        assert!(matches!(
            PipelineArtifacts::load(&storage),
            Err(SvmTextError::ArtifactLoad(_))
        ));
    }

    #[test]
    fn test_swapped_blobs_are_rejected() {
        let storage = MemoryStorage::new();
        fitted_artifacts().save(&storage).unwrap();
        let selector_blob = read_to_string(&storage, "chi_model").unwrap();
        storage.put("clf_model", selector_blob.as_bytes());

        match PipelineArtifacts::load(&storage) {
            Err(SvmTextError::ArtifactLoad(msg)) => assert!(msg.contains("clf_model")),
            other => panic!("Expected ArtifactLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let texts = ["need loan now", "no thanks bye"];
        let labels = [0, 1];
        let mut vectorizer = TfIdfVectorizer::new(TfIdfOptions::default()).unwrap();
        let weighted = vectorizer.fit_transform(&texts).unwrap();
        let mut selector = Chi2Selector::new(0.5).unwrap();
        selector.fit(&weighted, &labels).unwrap();

        let mut other = TfIdfVectorizer::new(TfIdfOptions::default()).unwrap();
        other.fit(&["completely different vocabulary here"]).unwrap();

        let reduced = selector.transform(&weighted).unwrap();
        let mut classifier = LinearSvm::new(SvmParams::default(), 1).unwrap();
        classifier.fit(&reduced, &labels).unwrap();

        assert!(matches!(
            PipelineArtifacts::new(other, selector, classifier),
            Err(SvmTextError::InvalidInput(_))
        ));
    }
}
