//! The nine MCP tool handlers (spec §6). Each is a plain async function over
//! request/response structs; the transport that serializes these over
//! stdio or HTTP is out of scope here and lives at the call site.

use codesearch_core::concurrency::IndexingLock;
use codesearch_core::config::{self, Config};
use codesearch_core::embedding::EmbeddingProvider;
use codesearch_core::error::{ErrorKind, Result, SearchError};
use codesearch_core::hybrid_search::{self, SearchMode};
use codesearch_core::metadata::{EmbeddingModels, Metadata};
use codesearch_core::model_compat::{self, Corpus, CurrentModel};
use codesearch_core::project::IndexPaths;
use codesearch_core::result_processing::{self, CompactResult};
use codesearch_core::security;
use codesearch_core::{fulltext_store::FullTextStore, lifecycle, query_expansion::QueryExpansion, vector_store::VectorStore};
use serde::Serialize;
use std::path::Path;

const MAX_QUERY_LENGTH: usize = 1000;

pub struct ToolContext<'a> {
    pub project_root: &'a Path,
    pub indexes_root: &'a Path,
    pub embedding_models: EmbeddingModels,
    pub code_embedder: &'a dyn EmbeddingProvider,
}

impl ToolContext<'_> {
    fn paths(&self) -> IndexPaths {
        IndexPaths::for_project(self.indexes_root, self.project_root)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Cancelled,
    NotFound,
    Error,
}

#[derive(Serialize)]
pub struct CreateIndexOutput {
    pub status: Status,
    pub project_path: Option<String>,
    pub files_indexed: Option<usize>,
    pub chunks_created: Option<usize>,
}

fn create_status(status: lifecycle::CreateStatus) -> Status {
    match status {
        lifecycle::CreateStatus::Success => Status::Success,
        lifecycle::CreateStatus::Cancelled => Status::Cancelled,
    }
}

pub async fn create_index(ctx: &ToolContext<'_>) -> Result<CreateIndexOutput> {
    let outcome = lifecycle::create_index(
        ctx.project_root,
        ctx.indexes_root,
        ctx.embedding_models.clone(),
        ctx.code_embedder,
        &lifecycle::NullObserver,
    )
    .await?;
    Ok(CreateIndexOutput {
        status: create_status(outcome.status),
        project_path: Some(ctx.project_root.display().to_string()),
        files_indexed: Some(outcome.files_indexed),
        chunks_created: Some(outcome.chunks_created),
    })
}

pub async fn reindex_project(ctx: &ToolContext<'_>) -> Result<CreateIndexOutput> {
    let outcome = lifecycle::reindex_project(
        ctx.project_root,
        ctx.indexes_root,
        ctx.embedding_models.clone(),
        ctx.code_embedder,
        &lifecycle::NullObserver,
    )
    .await?;
    Ok(CreateIndexOutput {
        status: create_status(outcome.status),
        project_path: Some(ctx.project_root.display().to_string()),
        files_indexed: Some(outcome.files_indexed),
        chunks_created: Some(outcome.chunks_created),
    })
}

#[derive(Serialize)]
pub struct DeleteIndexOutput {
    pub status: Status,
    pub project_path: Option<String>,
    pub message: Option<String>,
}

pub async fn delete_index(ctx: &ToolContext<'_>) -> Result<DeleteIndexOutput> {
    let indexes_root = ctx.indexes_root;
    let project_root = ctx.project_root;
    let outcome =
        with_indexing_lock(project_root, || async { lifecycle::delete_index(indexes_root, project_root, None) })
            .await?;
    let status = match outcome.status {
        lifecycle::DeleteStatus::Success => Status::Success,
        lifecycle::DeleteStatus::NotFound => Status::NotFound,
    };
    Ok(DeleteIndexOutput {
        status,
        project_path: Some(ctx.project_root.display().to_string()),
        message: (!outcome.warnings.is_empty()).then(|| outcome.warnings.join("; ")),
    })
}

#[derive(Serialize)]
pub struct ReindexFileOutput {
    pub status: Status,
    pub path: String,
    pub chunks_created: Option<usize>,
    pub message: Option<String>,
}

pub async fn reindex_file(ctx: &ToolContext<'_>, path: &str) -> Result<ReindexFileOutput> {
    let paths = ctx.paths();
    let project_root = ctx.project_root;
    let embedder = ctx.code_embedder;
    let outcome = with_indexing_lock(project_root, || {
        codesearch_core::incremental::reindex_file(project_root, &paths, path, embedder)
    })
    .await;
    match outcome {
        Ok(outcome) => Ok(ReindexFileOutput {
            status: Status::Success,
            path: path.to_string(),
            chunks_created: Some(outcome.chunks_created),
            message: (!outcome.warnings.is_empty()).then(|| outcome.warnings.join("; ")),
        }),
        Err(e) => Ok(ReindexFileOutput { status: Status::Error, path: path.to_string(), chunks_created: None, message: Some(e.user_message) }),
    }
}

#[derive(Serialize)]
pub struct IndexStatusOutput {
    pub status: String,
    pub project_path: Option<String>,
    pub total_files: Option<usize>,
    pub total_chunks: Option<usize>,
    pub storage_size: Option<u64>,
    pub warning: Option<String>,
}

pub fn get_index_status(ctx: &ToolContext<'_>) -> Result<IndexStatusOutput> {
    let outcome = lifecycle::get_index_status(ctx.indexes_root, ctx.project_root)?;
    let status_str = match outcome.status {
        lifecycle::Status::Ready => "ready",
        lifecycle::Status::Indexing => "indexing",
        lifecycle::Status::NotFound => "not_found",
        lifecycle::Status::Failed => "failed",
    };

    let mut warning = outcome.warning;
    if outcome.status != lifecycle::Status::NotFound {
        let paths = ctx.paths();
        if let Ok(Some(meta)) = Metadata::load_for_project(&paths.metadata(), &ctx.project_root.display().to_string()) {
            let current = CurrentModel { name: &ctx.embedding_models.code_model_name, dimension: ctx.embedding_models.code_model_dimension };
            if let Some(w) = model_compat::check_non_blocking(&meta.embedding_models, Corpus::Code, &current) {
                warning = Some(w);
            }
        }
    }

    Ok(IndexStatusOutput {
        status: status_str.to_string(),
        project_path: Some(ctx.project_root.display().to_string()),
        total_files: Some(outcome.total_files),
        total_chunks: Some(outcome.total_chunks),
        storage_size: Some(outcome.storage_size),
        warning,
    })
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ResultRow {
    Standard { path: String, start_line: usize, end_line: usize, text: String, score: f32 },
    Compact(CompactResult),
}

#[derive(Serialize)]
pub struct SearchOutput {
    pub results: Vec<ResultRow>,
    pub total_results: usize,
    pub search_mode: String,
    pub warning: Option<String>,
}

pub struct SearchParams<'a> {
    pub query: &'a str,
    pub top_k: usize,
    pub compact: bool,
    pub mode: Option<&'a str>,
    pub alpha: Option<f32>,
}

/// `search_code` and `search_docs` share this implementation; `corpus`
/// selects which vector store / fingerprint namespace to read.
pub async fn search(ctx: &ToolContext<'_>, corpus: Corpus, params: SearchParams<'_>) -> Result<SearchOutput> {
    security::validate_query_length(params.query, MAX_QUERY_LENGTH)?;
    if !(1..=50).contains(&params.top_k) {
        return Err(SearchError::new(ErrorKind::InvalidRequest, "top_k must be in 1..=50"));
    }
    let alpha = hybrid_search::validate_alpha(params.alpha)?;
    let requested_mode = SearchMode::parse(params.mode);

    let paths = ctx.paths();
    let project_key = ctx.project_root.display().to_string();
    let metadata = Metadata::load_for_project(&paths.metadata(), &project_key)?
        .ok_or_else(|| SearchError::index_not_found(&project_key))?;

    let current = CurrentModel { name: &ctx.embedding_models.code_model_name, dimension: ctx.embedding_models.code_model_dimension };
    model_compat::check_blocking(&metadata.embedding_models, corpus, &current)?;

    let store_path = match corpus {
        Corpus::Code => paths.code_vector_store(),
        Corpus::Docs => paths.docs_vector_store(),
    };
    let store = VectorStore::open(&store_path)?;

    let fulltext_bytes = std::fs::read(paths.fulltext_index()).ok();
    let mut fts = FullTextStore::new();
    let fulltext_available = fulltext_bytes.as_deref().map(|b| fts.deserialize(b)).unwrap_or(false);

    let decision = hybrid_search::effective_mode(requested_mode, fulltext_available);
    let over_pull = hybrid_search::over_pull_limit(params.top_k);

    let expansion = QueryExpansion::new();
    let expanded_query = expansion.expand(params.query);

    // Vector-only and fts-only modes are just fusion with the opposite leg
    // empty; `fuse`'s per-leg normalization still applies, which is what
    // makes a `mode=vector` score comparable to a hybrid one.
    let (vector_rows, fts_rows, effective_alpha) = match decision.mode {
        SearchMode::Vector => {
            let query_vector = ctx.code_embedder.embed(&expanded_query, codesearch_core::embedding::PromptType::Query).await?;
            (store.search(&query_vector, over_pull, None)?, Vec::new(), 1.0)
        }
        SearchMode::Fts => (Vec::new(), fts.search(params.query, over_pull), 0.0),
        SearchMode::Hybrid => {
            let query_vector = ctx.code_embedder.embed(&expanded_query, codesearch_core::embedding::PromptType::Query).await?;
            (store.search(&query_vector, over_pull, None)?, fts.search(params.query, over_pull), alpha)
        }
    };
    let fused = hybrid_search::fuse(&vector_rows, &fts_rows, effective_alpha, over_pull);

    let deduped = result_processing::deduplicate_same_file_results(fused);
    let mut final_rows = deduped;
    final_rows.truncate(params.top_k);

    let mode_str = match decision.mode {
        SearchMode::Vector => "vector",
        SearchMode::Fts => "fts",
        SearchMode::Hybrid => "hybrid",
    };

    let results = final_rows
        .iter()
        .map(|r| {
            if params.compact {
                ResultRow::Compact(result_processing::to_compact(r))
            } else {
                ResultRow::Standard {
                    path: r.path.clone(),
                    start_line: r.start_line,
                    end_line: r.end_line,
                    text: result_processing::trim_chunk_whitespace(&r.text),
                    score: r.score,
                }
            }
        })
        .collect::<Vec<_>>();

    let mut warning = decision.warning.map(|w| w.to_string());
    if metadata.indexing_state.state == Some(codesearch_core::metadata::IndexState::InProgress) {
        warning = Some("index is still being built; results may be stale".to_string());
    } else if metadata.indexing_state.state == Some(codesearch_core::metadata::IndexState::Failed) {
        warning = Some("the last indexing run failed; results may be incomplete".to_string());
    }

    Ok(SearchOutput { total_results: results.len(), results, search_mode: mode_str.to_string(), warning })
}

#[derive(Serialize)]
pub struct SearchByPathOutput {
    pub matches: Vec<String>,
    pub total_matches: usize,
}

pub fn search_by_path(ctx: &ToolContext<'_>, pattern: &str, limit: usize) -> Result<SearchByPathOutput> {
    if pattern.is_empty() || pattern.chars().count() > 200 {
        return Err(SearchError::invalid_pattern("pattern must be 1..=200 characters"));
    }
    security::validate_pattern(pattern)?;
    let limit = limit.clamp(1, 100);

    let paths = ctx.paths();
    let glob = globset::Glob::new(pattern).map_err(|e| SearchError::invalid_pattern(&e.to_string()))?.compile_matcher();

    let store = VectorStore::open(&paths.code_vector_store())?;
    let mut matches: Vec<String> = store.indexed_files()?.into_iter().filter(|p| glob.is_match(p)).collect();
    matches.sort();
    let total_matches = matches.len();
    matches.truncate(limit);
    Ok(SearchByPathOutput { matches, total_matches })
}

#[derive(Serialize)]
pub struct SymbolSummary {
    pub name: String,
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
    pub signature: String,
}

#[derive(Serialize)]
pub struct FileSummaryOutput {
    pub path: String,
    pub symbols: Vec<SymbolSummary>,
    pub complexity: Option<usize>,
}

/// Read-only: extracts a language-agnostic summary of a file's symbols via
/// tree-sitter when compiled in, falling back to the structural-stub
/// extractor otherwise.
pub fn get_file_summary(ctx: &ToolContext<'_>, path: &str, include_complexity: bool, include_docstrings: bool) -> Result<FileSummaryOutput> {
    let _ = include_docstrings;
    let absolute = codesearch_core::path_safety::safe_join(ctx.project_root, path).map_err(SearchError::invalid_path)?;
    if codesearch_core::path_safety::is_symlink(&absolute) {
        return Err(SearchError::new(ErrorKind::SymlinkNotAllowed, format!("{path} is a symlink")));
    }
    let content = std::fs::read_to_string(&absolute)?;
    let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");

    #[cfg(feature = "treesitter")]
    {
        if let Some(ast) = crate::ast::parse_file(&content, ext) {
            let complexity = include_complexity.then(|| ast.symbols.len());
            let symbols = ast
                .symbols
                .iter()
                .map(|s| SymbolSummary { name: s.name.clone(), kind: s.kind.label().to_string(), start_line: s.start_line, end_line: s.end_line, signature: s.signature.clone() })
                .collect();
            return Ok(FileSummaryOutput { path: path.to_string(), symbols, complexity });
        }
    }

    let stub = crate::stubs::extract_stubs(&content, ext);
    let line_count = stub.lines().count();
    Ok(FileSummaryOutput {
        path: path.to_string(),
        symbols: Vec::new(),
        complexity: include_complexity.then_some(line_count),
    })
}

#[derive(Serialize)]
pub struct ConfigOutput {
    pub config: Config,
    pub indexes_root: String,
    pub index_path: String,
}

pub fn get_config(ctx: &ToolContext<'_>) -> ConfigOutput {
    let paths = ctx.paths();
    let config = config::load(&paths.config());
    ConfigOutput { config, indexes_root: ctx.indexes_root.display().to_string(), index_path: paths.root.display().to_string() }
}

/// Acquire the global indexing lock for the duration of a mutating tool
/// call, surfacing the spec's `INDEXING_IN_PROGRESS` error on contention.
pub async fn with_indexing_lock<F, Fut, T>(project_root: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let project_key = project_root.display().to_string();
    let _guard = IndexingLock::global().acquire(&project_key, None).await?;
    f().await
}
