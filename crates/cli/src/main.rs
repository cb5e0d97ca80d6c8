//! Lightweight, read-only CLI over an existing `codesearch` index.
//!
//! Calls `codesearch-core` directly with no tool-handler layer in between —
//! there is no embedding model wired in here, so `search` only exercises the
//! full-text leg of the hybrid engine. Use the `codesearch` binary's
//! `search-code`/`search-docs` subcommands for vector and hybrid search.

use clap::{Parser, Subcommand};
use codesearch_core::project::{self, IndexPaths};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cs", version, about = "Fast keyword search over a codesearch index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (defaults to the nearest enclosing project marker from cwd).
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full-text keyword search over the indexed code corpus
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Glob-match indexed file paths
    SearchPath {
        pattern: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print a file's contents, optionally sliced by line range
    Read {
        /// Path relative to the project root
        relative: String,
        #[arg(long)]
        start: Option<usize>,
        #[arg(long)]
        end: Option<usize>,
    },
    /// Report index readiness and size
    Status,
    /// Print the effective per-project configuration
    Config,
}

fn paths(project_root: &std::path::Path) -> IndexPaths {
    IndexPaths::for_project(&project::indexes_root(), project_root)
}

fn resolve_root(path: Option<PathBuf>) -> PathBuf {
    let cwd = std::env::current_dir().expect("could not determine current directory");
    let root = path.unwrap_or_else(|| project::detect_project_root(&cwd));
    root.canonicalize().unwrap_or(root)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("codesearch=warn".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let root = resolve_root(cli.path);

    if let Err(e) = run(cli.command, &root, cli.json) {
        eprintln!("{}", e.user_message);
        std::process::exit(1);
    }
}

fn run(command: Commands, root: &std::path::Path, json: bool) -> codesearch_core::error::Result<()> {
    match command {
        Commands::Search { query, top_k } => {
            codesearch_core::security::validate_query_length(&query, 1000)?;
            let paths = paths(root);
            let bytes = std::fs::read(paths.fulltext_index())
                .map_err(|_| codesearch_core::error::SearchError::index_not_found(&root.display().to_string()))?;
            let mut store = codesearch_core::fulltext_store::FullTextStore::new();
            if !store.deserialize(&bytes) {
                return Err(codesearch_core::error::SearchError::index_corrupt("fulltext.bin failed to deserialize"));
            }
            let results = store.search(&query, top_k);
            if json {
                let items: Vec<_> = results
                    .iter()
                    .map(|r| serde_json::json!({"path": r.path, "start_line": r.start_line, "end_line": r.end_line, "score": r.raw_score}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items).unwrap());
            } else {
                for r in &results {
                    println!("{:<60} {}:{} {:>6.2}", r.path, r.start_line, r.end_line, r.raw_score);
                }
                eprintln!("\n{} results", results.len());
            }
        }
        Commands::SearchPath { pattern, limit } => {
            codesearch_core::security::validate_pattern(&pattern)?;
            let glob = globset::Glob::new(&pattern)
                .map_err(|e| codesearch_core::error::SearchError::invalid_pattern(&e.to_string()))?
                .compile_matcher();
            let store = codesearch_core::vector_store::VectorStore::open(&paths(root).code_vector_store())?;
            let mut matches: Vec<String> = store.indexed_files()?.into_iter().filter(|p| glob.is_match(p)).collect();
            matches.sort();
            matches.truncate(limit);
            if json {
                println!("{}", serde_json::to_string_pretty(&matches).unwrap());
            } else {
                for m in &matches {
                    println!("{m}");
                }
            }
        }
        Commands::Read { relative, start, end } => {
            let absolute = codesearch_core::path_safety::safe_join(root, &relative)
                .map_err(codesearch_core::error::SearchError::invalid_path)?;
            let content = std::fs::read_to_string(&absolute)?;
            let lines: Vec<&str> = content.lines().collect();
            let start = (start.unwrap_or(1).max(1) - 1).min(lines.len());
            let end = end.unwrap_or(lines.len()).min(lines.len()).max(start);
            if json {
                let out = serde_json::json!({"path": relative, "start_line": start + 1, "end_line": end, "content": lines[start..end].join("\n")});
                println!("{}", serde_json::to_string_pretty(&out).unwrap());
            } else {
                for (i, line) in lines[start..end].iter().enumerate() {
                    println!("{:>5} | {}", start + i + 1, line);
                }
            }
        }
        Commands::Status => {
            let outcome = codesearch_core::lifecycle::get_index_status(&project::indexes_root(), root)?;
            if json {
                let out = serde_json::json!({
                    "total_files": outcome.total_files,
                    "total_chunks": outcome.total_chunks,
                    "storage_size": outcome.storage_size,
                });
                println!("{}", serde_json::to_string_pretty(&out).unwrap());
            } else {
                println!("Files:   {}", outcome.total_files);
                println!("Chunks:  {}", outcome.total_chunks);
                println!("Storage: {} bytes", outcome.storage_size);
            }
        }
        Commands::Config => {
            let config = codesearch_core::config::load(&paths(root).config());
            println!("{}", serde_json::to_string_pretty(&config).unwrap());
        }
    }
    Ok(())
}
