//! `codesearch` — thin CLI shell over the tool handlers in [`codesearch_server::tools`].
//!
//! Each subcommand maps to one of the nine MCP tools; the process resolves a
//! project root, builds a [`tools::ToolContext`], calls the handler, and
//! prints its JSON output. Serving these over an actual MCP transport
//! (stdio/HTTP) is left to the integration that embeds this crate.

use clap::{Parser, Subcommand};
use codesearch_core::embedding::DeterministicTestEmbedder;
use codesearch_core::metadata::EmbeddingModels;
use codesearch_core::project;
use codesearch_server::tools::{self, SearchParams, ToolContext};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "codesearch", version, about = "Local semantic code-search engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (defaults to the nearest enclosing project marker from cwd).
    #[arg(long, global = true)]
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a project's index from scratch.
    CreateIndex,
    /// Re-run a full index over the current file set.
    ReindexProject,
    /// Remove a project's index from disk.
    DeleteIndex,
    /// Re-index a single file after an edit.
    ReindexFile {
        /// Path relative to the project root.
        file: String,
    },
    /// Report whether a project's index is ready, building, or absent.
    IndexStatus,
    /// Hybrid vector+keyword search over source code.
    SearchCode(SearchArgs),
    /// Hybrid vector+keyword search over docs/comments.
    SearchDocs(SearchArgs),
    /// Glob-match indexed file paths.
    SearchByPath {
        pattern: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Extract a file's symbol outline.
    FileSummary {
        /// Path relative to the project root.
        file: String,
        #[arg(long)]
        complexity: bool,
        #[arg(long)]
        docstrings: bool,
    },
    /// Print the effective per-project configuration.
    Config,
}

#[derive(clap::Args)]
struct SearchArgs {
    query: String,
    #[arg(long, default_value_t = 10)]
    top_k: usize,
    #[arg(long)]
    compact: bool,
    #[arg(long)]
    mode: Option<String>,
    #[arg(long)]
    alpha: Option<f32>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("codesearch=info".parse().unwrap()),
        )
        .with_target(false)
        .init();
}

/// The real embedding backend is an external collaborator (spec'd as a
/// black box); until one is wired in, fall back to a deterministic
/// placeholder so the rest of the pipeline is exercisable end to end.
fn code_embedder() -> DeterministicTestEmbedder {
    let name = std::env::var("CODESEARCH_CODE_MODEL").unwrap_or_else(|_| "placeholder-code-v1".to_string());
    let dim = std::env::var("CODESEARCH_CODE_MODEL_DIM").ok().and_then(|s| s.parse().ok()).unwrap_or(384);
    DeterministicTestEmbedder::new(name, dim)
}

fn embedding_models(embedder: &DeterministicTestEmbedder) -> EmbeddingModels {
    use codesearch_core::embedding::EmbeddingProvider;
    EmbeddingModels {
        code_model_name: embedder.model_name().to_string(),
        code_model_dimension: embedder.dimension(),
        docs_model_name: embedder.model_name().to_string(),
        docs_model_dimension: embedder.dimension(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => error!("failed to serialize output: {e}"),
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let cwd = std::env::current_dir().expect("could not determine current directory");
    let project_root = cli.path.unwrap_or_else(|| project::detect_project_root(&cwd));
    let project_root = project_root.canonicalize().unwrap_or(project_root);
    let indexes_root = project::indexes_root();

    let embedder = code_embedder();
    let ctx = ToolContext {
        project_root: &project_root,
        indexes_root: &indexes_root,
        embedding_models: embedding_models(&embedder),
        code_embedder: &embedder,
    };

    let result = run(&ctx, cli.command).await;
    if let Err(e) = result {
        error!("{}", e.user_message);
        std::process::exit(1);
    }
}

async fn run(ctx: &ToolContext<'_>, command: Commands) -> codesearch_core::error::Result<()> {
    match command {
        Commands::CreateIndex => print_json(&tools::create_index(ctx).await?),
        Commands::ReindexProject => print_json(&tools::reindex_project(ctx).await?),
        Commands::DeleteIndex => print_json(&tools::delete_index(ctx).await?),
        Commands::ReindexFile { file } => print_json(&tools::reindex_file(ctx, &file).await?),
        Commands::IndexStatus => print_json(&tools::get_index_status(ctx)?),
        Commands::SearchCode(args) => {
            let params = SearchParams { query: &args.query, top_k: args.top_k, compact: args.compact, mode: args.mode.as_deref(), alpha: args.alpha };
            print_json(&tools::search(ctx, codesearch_core::model_compat::Corpus::Code, params).await?)
        }
        Commands::SearchDocs(args) => {
            let params = SearchParams { query: &args.query, top_k: args.top_k, compact: args.compact, mode: args.mode.as_deref(), alpha: args.alpha };
            print_json(&tools::search(ctx, codesearch_core::model_compat::Corpus::Docs, params).await?)
        }
        Commands::SearchByPath { pattern, limit } => print_json(&tools::search_by_path(ctx, &pattern, limit)?),
        Commands::FileSummary { file, complexity, docstrings } => {
            print_json(&tools::get_file_summary(ctx, &file, complexity, docstrings)?)
        }
        Commands::Config => print_json(&tools::get_config(ctx)),
    }
    Ok(())
}
