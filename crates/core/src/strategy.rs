//! Eager/lazy indexing strategy orchestrator (spec §4.12).

use crate::config::IndexingStrategy;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::incremental;
use crate::project::IndexPaths;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Tracks pending file-change paths for the `lazy` strategy and drains them
/// through single-file reindex on `flush()`.
pub struct StrategyOrchestrator {
    current: Mutex<IndexingStrategy>,
    dirty: Mutex<BTreeSet<String>>,
    dirty_file_path: PathBuf,
}

impl StrategyOrchestrator {
    pub fn new(initial: IndexingStrategy, paths: &IndexPaths) -> Self {
        let dirty = load_dirty_set(&paths.dirty_files());
        Self { current: Mutex::new(initial), dirty: Mutex::new(dirty), dirty_file_path: paths.dirty_files() }
    }

    pub fn set_strategy(&self, strategy: IndexingStrategy) {
        *self.current.lock().unwrap() = strategy;
    }

    pub fn current_strategy(&self) -> IndexingStrategy {
        *self.current.lock().unwrap()
    }

    /// Record a file-change event. Under `eager`, the caller is expected to
    /// reindex immediately and never calls this; under `lazy`, the path is
    /// appended to the in-memory and on-disk dirty set.
    pub fn mark_dirty(&self, relative_path: &str) -> Result<()> {
        let mut dirty = self.dirty.lock().unwrap();
        dirty.insert(relative_path.to_string());
        save_dirty_set(&self.dirty_file_path, &dirty)
    }

    pub fn pending(&self) -> Vec<String> {
        self.dirty.lock().unwrap().iter().cloned().collect()
    }

    /// Drain the dirty set through single-file reindex. A search tool calls
    /// this before querying whenever a strategy orchestrator is present.
    pub async fn flush(
        &self,
        project_root: &Path,
        index_paths: &IndexPaths,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<String>> {
        let paths: Vec<String> = self.dirty.lock().unwrap().iter().cloned().collect();
        let mut reindexed = Vec::new();
        for path in &paths {
            incremental::reindex_file(project_root, index_paths, path, embedder).await?;
            reindexed.push(path.clone());
        }
        let mut dirty = self.dirty.lock().unwrap();
        dirty.clear();
        save_dirty_set(&self.dirty_file_path, &dirty)?;
        Ok(reindexed)
    }
}

fn load_dirty_set(path: &Path) -> BTreeSet<String> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .map(|v| v.into_iter().collect())
        .unwrap_or_default()
}

fn save_dirty_set(path: &Path, dirty: &BTreeSet<String>) -> Result<()> {
    let list: Vec<&String> = dirty.iter().collect();
    crate::atomic_store::save_json(path, &list)
}
