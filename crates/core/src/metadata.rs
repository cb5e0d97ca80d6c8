//! Index-level statistics, model identity, and the indexing state machine.

use crate::atomic_store::{self, DEFAULT_MAX_LOAD_BYTES};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    #[serde(rename = "totalFiles")]
    pub total_files: usize,
    #[serde(rename = "totalChunks")]
    pub total_chunks: usize,
    #[serde(rename = "storageBytes")]
    pub storage_bytes: u64,
    #[serde(rename = "failedEmbeddings")]
    pub failed_embeddings: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingModels {
    #[serde(rename = "codeModelName")]
    pub code_model_name: String,
    #[serde(rename = "codeModelDimension")]
    pub code_model_dimension: usize,
    #[serde(rename = "docsModelName")]
    pub docs_model_name: String,
    #[serde(rename = "docsModelDimension")]
    pub docs_model_dimension: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HybridSearchConfig {
    pub enabled: bool,
    #[serde(rename = "defaultAlpha")]
    pub default_alpha: f64,
    #[serde(rename = "ftsEngine")]
    pub fts_engine: String,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self { enabled: true, default_alpha: 0.5, fts_engine: "bm25-inverted".to_string() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    InProgress,
    Complete,
    Failed,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexingState {
    pub state: Option<IndexState>,
    #[serde(rename = "expectedFiles")]
    pub expected_files: Option<usize>,
    #[serde(rename = "processedFiles")]
    pub processed_files: Option<usize>,
    #[serde(rename = "startedAt")]
    pub started_at: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

impl IndexingState {
    pub fn in_progress(expected_files: usize) -> Self {
        Self {
            state: Some(IndexState::InProgress),
            expected_files: Some(expected_files),
            processed_files: Some(0),
            started_at: Some(now_iso()),
            error_message: None,
        }
    }

    pub fn complete() -> Self {
        Self { state: Some(IndexState::Complete), error_message: None, ..Default::default() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { state: Some(IndexState::Failed), error_message: Some(message.into()), ..Default::default() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    #[serde(rename = "schemaVersion", default = "schema_version_default")]
    pub schema_version: u32,
    #[serde(rename = "projectPath")]
    pub project_path: String,
    pub stats: Stats,
    #[serde(rename = "lastFullIndex")]
    pub last_full_index: Option<String>,
    #[serde(rename = "lastIncrementalUpdate")]
    pub last_incremental_update: Option<String>,
    #[serde(rename = "embeddingModels")]
    pub embedding_models: EmbeddingModels,
    #[serde(rename = "hybridSearch")]
    pub hybrid_search: HybridSearchConfig,
    #[serde(rename = "indexingState")]
    pub indexing_state: IndexingState,
}

fn schema_version_default() -> u32 {
    SCHEMA_VERSION
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Metadata {
    pub fn new(project_path: impl Into<String>, embedding_models: EmbeddingModels) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            project_path: project_path.into(),
            stats: Stats::default(),
            last_full_index: None,
            last_incremental_update: None,
            embedding_models,
            hybrid_search: HybridSearchConfig::default(),
            indexing_state: IndexingState::default(),
        }
    }

    /// Load metadata, asserting `project_path` matches. A mismatch is
    /// treated as "no index found" rather than a corruption error, per spec
    /// §3.
    pub fn load_for_project(path: &Path, project_path: &str) -> Result<Option<Self>> {
        match atomic_store::load_json::<Self>(path, DEFAULT_MAX_LOAD_BYTES)? {
            None => Ok(None),
            Some(meta) if meta.project_path == project_path => Ok(Some(meta)),
            Some(_) => Ok(None),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_store::save_json(path, self)
    }

    pub fn mark_in_progress(&mut self, expected_files: usize) {
        self.indexing_state = IndexingState::in_progress(expected_files);
    }

    pub fn mark_complete(&mut self) {
        self.indexing_state = IndexingState::complete();
        self.last_full_index = Some(now_iso());
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.indexing_state = IndexingState::failed(message);
    }

    pub fn mark_incremental_update(&mut self) {
        self.last_incremental_update = Some(now_iso());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> EmbeddingModels {
        EmbeddingModels {
            code_model_name: "minilm".into(),
            code_model_dimension: 384,
            docs_model_name: "minilm".into(),
            docs_model_dimension: 384,
        }
    }

    #[test]
    fn round_trip_preserves_all_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        let mut meta = Metadata::new("/some/project", models());
        meta.mark_complete();
        meta.save(&path).unwrap();

        let loaded = Metadata::load_for_project(&path, "/some/project").unwrap().unwrap();
        assert_eq!(loaded, meta);
    }

    #[test]
    fn project_path_mismatch_is_treated_as_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        let meta = Metadata::new("/some/project", models());
        meta.save(&path).unwrap();

        let loaded = Metadata::load_for_project(&path, "/other/project").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_metadata_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        std::fs::write(&path, "{not json").unwrap();
        let result = Metadata::load_for_project(&path, "/some/project");
        assert!(result.is_err());
    }

    #[test]
    fn state_transitions_set_expected_fields() {
        let mut meta = Metadata::new("/p", models());
        meta.mark_in_progress(10);
        assert_eq!(meta.indexing_state.state, Some(IndexState::InProgress));
        assert_eq!(meta.indexing_state.expected_files, Some(10));

        meta.mark_failed("disk full");
        assert_eq!(meta.indexing_state.state, Some(IndexState::Failed));
        assert_eq!(meta.indexing_state.error_message.as_deref(), Some("disk full"));

        meta.mark_complete();
        assert_eq!(meta.indexing_state.state, Some(IndexState::Complete));
        assert!(meta.last_full_index.is_some());
    }
}
