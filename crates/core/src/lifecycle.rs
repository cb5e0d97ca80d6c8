//! Index lifecycle: create, reindex, delete, status (spec §4.13).

use crate::chunker;
use crate::concurrency::IndexingLock;
use crate::config::{self, Config};
use crate::embedding::{EmbeddingProvider, PromptType};
use crate::error::{Result, SearchError};
use crate::fingerprints::{self, Fingerprints};
use crate::fulltext_store::FullTextStore;
use crate::guards;
use crate::metadata::{EmbeddingModels, Metadata};
use crate::path_safety;
use crate::policy::IndexingPolicy;
use crate::project::IndexPaths;
use crate::vector_store::{ChunkRecord, VectorStore};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Documentation-leg classification: anything not recognized as prose goes
/// through the code leg. Matches the extensions the corpus treats as
/// documentation (markdown, restructured text, plain text, asciidoc).
fn is_doc_path(rel_path: &str) -> bool {
    let ext = rel_path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
    matches!(ext.as_str(), "md" | "mdx" | "rst" | "txt" | "adoc")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Chunking,
    Embedding,
    Storing,
}

pub struct Progress {
    pub phase: Phase,
    pub current: usize,
    pub total: usize,
    pub current_file: Option<String>,
}

/// Optional progress sink; absence is first-class (§9 design notes).
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

pub struct NullObserver;
impl ProgressObserver for NullObserver {
    fn on_progress(&self, _progress: Progress) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateStatus {
    Success,
    Cancelled,
}

pub struct CreateOutcome {
    pub status: CreateStatus,
    pub files_indexed: usize,
    pub chunks_created: usize,
}

fn collect_candidates(project_root: &Path, policy: &IndexingPolicy, max_files: usize) -> Vec<(String, PathBuf, u64)> {
    let mut accepted = Vec::new();
    let walker = WalkBuilder::new(project_root)
        .hidden(false)
        .git_ignore(false)
        .max_depth(Some(guards::WALK_MAX_DEPTH))
        .build();
    let started = std::time::Instant::now();
    let mut entries_seen = 0usize;
    for entry in walker.flatten() {
        entries_seen += 1;
        if !guards::walk_should_continue(entry.depth(), entries_seen, started.elapsed()) {
            break;
        }
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let absolute = entry.path().to_path_buf();
        if path_safety::is_symlink(&absolute) {
            continue;
        }
        let Some(rel) = path_safety::to_relative(project_root, &absolute) else { continue };
        let size = std::fs::metadata(&absolute).map(|m| m.len()).unwrap_or(0);
        let decision = policy.evaluate(&rel, size, accepted.len());
        if decision.should_index {
            accepted.push((rel, absolute, size));
            if accepted.len() >= max_files {
                break;
            }
        }
    }
    accepted
}

/// Default adaptive-batch size for embedding calls before memory throttling
/// (see [`guards::throttled_batch_size`]); floor is the minimum batch under
/// critical memory pressure.
const EMBED_BATCH_DEFAULT: usize = 32;
const EMBED_BATCH_FLOOR: usize = 4;

/// Create (or, if an index already exists, rebuild) the index for
/// `project_root`.
pub async fn create_index(
    project_root: &Path,
    indexes_root: &Path,
    embedding_models: EmbeddingModels,
    code_embedder: &dyn EmbeddingProvider,
    observer: &dyn ProgressObserver,
) -> Result<CreateOutcome> {
    let paths = IndexPaths::for_project(indexes_root, project_root);
    let project_key = project_root.display().to_string();

    let _lock = IndexingLock::global().acquire(&project_key, None).await?;

    std::fs::create_dir_all(&paths.root)?;
    let is_rebuild = paths.exists();
    let config = if is_rebuild { config::load(&paths.config()) } else { Config::default() };
    if is_rebuild {
        // Preserve config.json; drop everything derived.
        let _ = std::fs::remove_file(paths.metadata());
        let _ = std::fs::remove_file(paths.fingerprints());
        let _ = std::fs::remove_file(paths.docs_fingerprints());
        let _ = std::fs::remove_file(paths.code_vector_store());
        let _ = std::fs::remove_file(paths.docs_vector_store());
        let _ = std::fs::remove_file(paths.fulltext_index());
    } else {
        config::save(&paths.config(), &config)?;
    }

    guards::check_disk_preflight(&paths.root, config.max_files)?;

    let policy = IndexingPolicy::new(project_root, &config);
    let candidates = collect_candidates(project_root, &policy, config.max_files);
    let total = candidates.len();

    observer.on_progress(Progress { phase: Phase::Scanning, current: 0, total, current_file: None });

    let mut metadata = Metadata::new(project_key.clone(), embedding_models);
    metadata.mark_in_progress(total);
    metadata.save(&paths.metadata())?;

    let result = run_indexing(&paths, project_root, &candidates, total, code_embedder, observer, &mut metadata).await;

    match result {
        Ok((files_indexed, chunks_created)) => {
            metadata.mark_complete();
            metadata.save(&paths.metadata())?;
            Ok(CreateOutcome { status: CreateStatus::Success, files_indexed, chunks_created })
        }
        Err(e) => {
            metadata.mark_failed(e.dev_message.clone());
            let _ = metadata.save(&paths.metadata());
            Err(e)
        }
    }
}

/// The fallible body of a create/rebuild run, split out so [`create_index`]
/// can intercept any `Err` and persist `indexingState=failed` before
/// propagating (§4.13, §7).
#[allow(clippy::too_many_arguments)]
async fn run_indexing(
    paths: &IndexPaths,
    _project_root: &Path,
    candidates: &[(String, PathBuf, u64)],
    total: usize,
    code_embedder: &dyn EmbeddingProvider,
    observer: &dyn ProgressObserver,
    metadata: &mut Metadata,
) -> Result<(usize, usize)> {
    let mut code_store = VectorStore::open(&paths.code_vector_store())?;
    let mut docs_store = VectorStore::open(&paths.docs_vector_store())?;
    let mut fts = FullTextStore::new();
    let mut fingerprints = Fingerprints::default();
    let mut docs_fingerprints = Fingerprints::default();
    let mut chunks_created = 0usize;
    let mut files_indexed = 0usize;
    let mut last_disk_check = std::time::Instant::now();

    for (index, (rel_path, absolute, _size)) in candidates.iter().enumerate() {
        observer.on_progress(Progress {
            phase: Phase::Chunking,
            current: index,
            total,
            current_file: Some(rel_path.clone()),
        });

        if last_disk_check.elapsed() >= guards::DISK_MONITOR_INTERVAL {
            guards::check_disk_monitor(&paths.root)?;
            last_disk_check = std::time::Instant::now();
        }

        let content = match std::fs::read_to_string(absolute) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let chunk_result = chunker::chunk_file(rel_path, &content);
        let is_doc = is_doc_path(rel_path);
        if chunk_result.chunks.is_empty() {
            if is_doc {
                docs_fingerprints.set(rel_path.clone(), fingerprints::hash_bytes(content.as_bytes()));
            } else {
                fingerprints.set(rel_path.clone(), fingerprints::hash_bytes(content.as_bytes()));
            }
            continue;
        }

        observer.on_progress(Progress {
            phase: Phase::Embedding,
            current: index,
            total,
            current_file: Some(rel_path.clone()),
        });

        let prompt_type = if is_doc { PromptType::Docs } else { PromptType::Code };
        let batch_size = guards::throttled_batch_size(EMBED_BATCH_DEFAULT, EMBED_BATCH_FLOOR);
        let mut records = Vec::with_capacity(chunk_result.chunks.len());
        for chunk_batch in chunk_result.chunks.chunks(batch_size) {
            let texts: Vec<String> = chunk_batch.iter().map(|c| c.text.clone()).collect();
            match code_embedder.embed_batch(&texts, prompt_type).await {
                Ok(vectors) => {
                    records.extend(chunk_batch.iter().zip(vectors).map(|(chunk, embedding)| ChunkRecord {
                        id: chunk.id.clone(),
                        path: rel_path.clone(),
                        start_line: chunk.start_line,
                        end_line: chunk.end_line,
                        text: chunk.text.clone(),
                        embedding,
                    }));
                }
                Err(_) => {
                    metadata.stats.failed_embeddings += chunk_batch.len();
                }
            }
        }

        if !records.is_empty() {
            observer.on_progress(Progress {
                phase: Phase::Storing,
                current: index,
                total,
                current_file: Some(rel_path.clone()),
            });
            for chunk in &chunk_result.chunks {
                fts.ingest(&chunk.id, rel_path, chunk.start_line, chunk.end_line, &chunk.text);
            }
            if is_doc {
                docs_store.insert_chunks(&records)?;
            } else {
                code_store.insert_chunks(&records)?;
            }
            chunks_created += records.len();
        }
        if is_doc {
            docs_fingerprints.set(rel_path.clone(), fingerprints::hash_bytes(content.as_bytes()));
        } else {
            fingerprints.set(rel_path.clone(), fingerprints::hash_bytes(content.as_bytes()));
        }
        files_indexed += 1;
    }

    fingerprints.save(&paths.fingerprints())?;
    docs_fingerprints.save(&paths.docs_fingerprints())?;
    std::fs::write(paths.fulltext_index(), fts.serialize())?;

    metadata.stats.total_files = code_store.count_files()? + docs_store.count_files()?;
    metadata.stats.total_chunks = code_store.count_chunks()? + docs_store.count_chunks()?;
    metadata.stats.storage_bytes = code_store.storage_size_bytes(&paths.code_vector_store())
        + docs_store.storage_size_bytes(&paths.docs_vector_store())
        + std::fs::metadata(paths.fulltext_index()).map(|m| m.len()).unwrap_or(0);

    Ok((files_indexed, chunks_created))
}

pub async fn reindex_project(
    project_root: &Path,
    indexes_root: &Path,
    embedding_models: EmbeddingModels,
    code_embedder: &dyn EmbeddingProvider,
    observer: &dyn ProgressObserver,
) -> Result<CreateOutcome> {
    create_index(project_root, indexes_root, embedding_models, code_embedder, observer).await
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    Success,
    NotFound,
}

pub struct DeleteOutcome {
    pub status: DeleteStatus,
    pub warnings: Vec<String>,
}

/// Stop-watcher and close-store callbacks are optional capability traits;
/// absence is first-class.
pub trait StopWatcher: Send + Sync {
    fn stop(&self);
}

pub fn delete_index(
    indexes_root: &Path,
    project_root: &Path,
    stop_watcher: Option<&dyn StopWatcher>,
) -> Result<DeleteOutcome> {
    let paths = IndexPaths::for_project(indexes_root, project_root);
    if !paths.exists() {
        return Ok(DeleteOutcome { status: DeleteStatus::NotFound, warnings: Vec::new() });
    }
    if !path_safety::is_within_directory(&paths.root, indexes_root) {
        return Err(SearchError::invalid_path("index directory does not resolve under the indexes root"));
    }

    if let Some(watcher) = stop_watcher {
        watcher.stop();
    }

    let mut warnings = Vec::new();
    if let Ok(entries) = std::fs::read_dir(&paths.root) {
        for entry in entries.flatten() {
            let path = entry.path();
            let result = if path.is_dir() { std::fs::remove_dir_all(&path) } else { std::fs::remove_file(&path) };
            if let Err(e) = result {
                warnings.push(format!("failed to remove {}: {e}", path.display()));
            }
        }
    }
    if std::fs::read_dir(&paths.root).map(|mut it| it.next().is_none()).unwrap_or(false) {
        let _ = std::fs::remove_dir(&paths.root);
    }

    Ok(DeleteOutcome { status: DeleteStatus::Success, warnings })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ready,
    Indexing,
    NotFound,
    Failed,
}

pub struct StatusOutcome {
    pub status: Status,
    pub total_files: usize,
    pub total_chunks: usize,
    pub storage_size: u64,
    pub warning: Option<String>,
}

pub fn get_index_status(indexes_root: &Path, project_root: &Path) -> Result<StatusOutcome> {
    let paths = IndexPaths::for_project(indexes_root, project_root);
    let project_key = project_root.display().to_string();
    let Some(metadata) = Metadata::load_for_project(&paths.metadata(), &project_key)? else {
        return Ok(StatusOutcome {
            status: Status::NotFound,
            total_files: 0,
            total_chunks: 0,
            storage_size: 0,
            warning: None,
        });
    };

    let status = match metadata.indexing_state.state {
        Some(crate::metadata::IndexState::InProgress) => Status::Indexing,
        Some(crate::metadata::IndexState::Failed) => Status::Failed,
        _ => Status::Ready,
    };

    let storage_size = std::fs::metadata(paths.code_vector_store()).map(|m| m.len()).unwrap_or(0)
        + std::fs::metadata(paths.docs_vector_store()).map(|m| m.len()).unwrap_or(0)
        + std::fs::metadata(paths.fulltext_index()).map(|m| m.len()).unwrap_or(0);

    Ok(StatusOutcome {
        status,
        total_files: metadata.stats.total_files,
        total_chunks: metadata.stats.total_chunks,
        storage_size,
        warning: None,
    })
}
