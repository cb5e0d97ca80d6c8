//! Single-file reindex: the exact nine-step sequence from the incremental
//! update protocol. Each step either fully succeeds or the whole operation
//! aborts before any destructive action became observable; any error still
//! closes the vector store before propagating.

use crate::chunker;
use crate::config::Config;
use crate::embedding::{EmbeddingProvider, PromptType};
use crate::error::{ErrorKind, Result, SearchError};
use crate::fingerprints::{self, Fingerprints};
use crate::metadata::Metadata;
use crate::path_safety;
use crate::policy::IndexingPolicy;
use crate::project::IndexPaths;
use crate::vector_store::{ChunkRecord, VectorStore};
use std::path::Path;

pub struct ReindexOutcome {
    pub chunks_created: usize,
    pub warnings: Vec<String>,
}

/// Reindex a single relative path within an already-created index.
pub async fn reindex_file(
    project_root: &Path,
    paths: &IndexPaths,
    relative_path: &str,
    embedder: &dyn EmbeddingProvider,
) -> Result<ReindexOutcome> {
    // 1. Verify the index exists.
    if !paths.exists() {
        return Err(SearchError::index_not_found(&project_root.display().to_string()));
    }

    // 2. Load config and policy; validate the relative path.
    let config = crate::config::load(&paths.config());
    let absolute =
        path_safety::safe_join(project_root, relative_path).map_err(SearchError::invalid_path)?;
    if path_safety::is_symlink(&absolute) {
        return Err(SearchError::new(ErrorKind::SymlinkNotAllowed, format!("{relative_path} is a symlink")));
    }
    let policy = IndexingPolicy::new(project_root, &config);

    let size_bytes = std::fs::metadata(&absolute).map(|m| m.len()).unwrap_or(0);
    let decision = policy.evaluate(relative_path, size_bytes, 0);
    if !decision.should_index {
        return Err(SearchError::invalid_path(&format!(
            "{relative_path} is excluded by policy: {}",
            decision.reason.unwrap_or_default()
        )));
    }

    // 3. Open vector store, load fingerprints/metadata.
    let mut store = VectorStore::open(&paths.code_vector_store())?;
    let result = run_steps_4_to_8(&mut store, paths, project_root, relative_path, &absolute, embedder).await;
    // 9. Close the vector store regardless of outcome (rusqlite connection
    // drops here; nothing further to flush since every write already
    // committed within its own transaction).
    drop(store);
    result
}

async fn run_steps_4_to_8(
    store: &mut VectorStore,
    paths: &IndexPaths,
    project_root: &Path,
    relative_path: &str,
    absolute: &Path,
    embedder: &dyn EmbeddingProvider,
) -> Result<ReindexOutcome> {
    // 4. Remove any existing rows for this path.
    store.delete_by_path(relative_path)?;

    // 5. Chunk the file. A file that was deleted out from under us produces
    // zero chunks; still proceed to persist the fingerprint removal below.
    let content = std::fs::read_to_string(absolute).unwrap_or_default();
    let chunk_result = chunker::chunk_file(relative_path, &content);

    let mut warnings = Vec::new();
    let mut chunks_created = 0usize;

    // 6. Batch-embed; insert only rows whose embeddings succeeded.
    if !chunk_result.chunks.is_empty() {
        let texts: Vec<String> = chunk_result.chunks.iter().map(|c| c.text.clone()).collect();
        let mut records = Vec::new();
        match embedder.embed_batch(&texts, PromptType::Code).await {
            Ok(vectors) => {
                for (chunk, vector) in chunk_result.chunks.iter().zip(vectors.into_iter()) {
                    records.push(ChunkRecord {
                        id: chunk.id.clone(),
                        path: relative_path.to_string(),
                        start_line: chunk.start_line,
                        end_line: chunk.end_line,
                        text: chunk.text.clone(),
                        embedding: vector,
                    });
                }
            }
            Err(e) => {
                warnings.push(format!("embedding failed, no chunks inserted for {relative_path}: {e}"));
            }
        }
        if !records.is_empty() {
            store.insert_chunks(&records)?;
            chunks_created = records.len();
        }
    }

    // 7. Compute the new content hash; update the fingerprint store.
    let mut fingerprints = Fingerprints::load(&paths.fingerprints())?;
    if content.is_empty() && !absolute.exists() {
        fingerprints.remove(relative_path);
    } else {
        fingerprints.set(relative_path, fingerprints::hash_bytes(content.as_bytes()));
    }
    fingerprints.save(&paths.fingerprints())?;

    // 8. Recompute counts and storage size; update metadata.
    let mut metadata = Metadata::load_for_project(&paths.metadata(), &project_root.display().to_string())?
        .ok_or_else(|| SearchError::index_not_found(&project_root.display().to_string()))?;
    metadata.stats.total_files = store.count_files()?;
    metadata.stats.total_chunks = store.count_chunks()?;
    metadata.stats.storage_bytes = store.storage_size_bytes(&paths.code_vector_store());
    metadata.mark_incremental_update();
    metadata.save(&paths.metadata())?;

    Ok(ReindexOutcome { chunks_created, warnings })
}
