//! Test harness for the MCP tool handlers.
//!
//! Builds a `ToolContext` over fixture files copied into a temp project dir,
//! with index storage in a separate temp "indexes root", then calls the
//! `codesearch_server::tools` functions directly — no JSON-RPC or transport
//! layer involved.

pub mod fixtures;

use codesearch_core::embedding::DeterministicTestEmbedder;
use codesearch_core::metadata::EmbeddingModels;
use codesearch_server::tools::ToolContext;
use tempfile::TempDir;

pub struct TestProject {
    pub project_dir: TempDir,
    pub indexes_dir: TempDir,
    pub embedder: DeterministicTestEmbedder,
}

impl TestProject {
    /// Create a project dir populated from a named fixture, with its own
    /// isolated indexes root (so tests never touch `~/.mcp/search`).
    pub fn from_fixture(name: &str) -> Self {
        let fixture_src =
            std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
        assert!(fixture_src.exists(), "fixture '{name}' not found at {}", fixture_src.display());

        let project_dir = TempDir::new().expect("create project temp dir");
        fixtures::copy_dir_recursive(&fixture_src, project_dir.path());

        let indexes_dir = TempDir::new().expect("create indexes temp dir");

        Self {
            project_dir,
            indexes_dir,
            embedder: DeterministicTestEmbedder::new("test-embedder-v1", 32),
        }
    }

    pub fn root(&self) -> std::path::PathBuf {
        self.project_dir.path().canonicalize().expect("canonicalize project dir")
    }

    pub fn ctx(&self) -> ToolContext<'_> {
        ToolContext {
            project_root: self.project_dir.path(),
            indexes_root: self.indexes_dir.path(),
            embedding_models: self.embedding_models(),
            code_embedder: &self.embedder,
        }
    }

    pub fn embedding_models(&self) -> EmbeddingModels {
        use codesearch_core::embedding::EmbeddingProvider;
        EmbeddingModels {
            code_model_name: self.embedder.model_name().to_string(),
            code_model_dimension: self.embedder.dimension(),
            docs_model_name: self.embedder.model_name().to_string(),
            docs_model_dimension: self.embedder.dimension(),
        }
    }

    /// Write (or overwrite) a file relative to the project root.
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.project_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, content).expect("write fixture file");
    }
}
