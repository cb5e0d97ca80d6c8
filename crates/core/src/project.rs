//! Project identity and the on-disk index directory layout (spec §3, §6).

use crate::path_safety;
use std::path::{Path, PathBuf};

/// Resolve `~/.mcp/search` from the user's home directory.
pub fn search_root() -> PathBuf {
    let home = dirs_home();
    home.join(".mcp").join("search")
}

pub fn indexes_root() -> PathBuf {
    search_root().join("indexes")
}

#[cfg(not(test))]
fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
fn dirs_home() -> PathBuf {
    std::env::temp_dir()
}

/// Paths to every file/subdirectory that makes up a single project's index.
#[derive(Clone, Debug)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn for_project(indexes_root: &Path, project_root: &Path) -> Self {
        Self { root: path_safety::index_path_for_project(indexes_root, project_root) }
    }

    pub fn code_vector_store(&self) -> PathBuf {
        self.root.join("code.db")
    }
    pub fn docs_vector_store(&self) -> PathBuf {
        self.root.join("docs.db")
    }
    pub fn fulltext_index(&self) -> PathBuf {
        self.root.join("fulltext.bin")
    }
    pub fn config(&self) -> PathBuf {
        self.root.join("config.json")
    }
    pub fn metadata(&self) -> PathBuf {
        self.root.join("metadata.json")
    }
    pub fn fingerprints(&self) -> PathBuf {
        self.root.join("fingerprints.json")
    }
    pub fn docs_fingerprints(&self) -> PathBuf {
        self.root.join("docs-fingerprints.json")
    }
    pub fn dirty_files(&self) -> PathBuf {
        self.root.join("dirty-files.json")
    }
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn exists(&self) -> bool {
        self.metadata().is_file()
    }
}

/// Walk upward from `start` looking for a project-root marker
/// (`.git`, `Cargo.toml`, `package.json`, `.codesearch.toml`, …), falling
/// back to `start` itself.
pub fn detect_project_root(start: &Path) -> PathBuf {
    const MARKERS: &[&str] =
        &[".git", "Cargo.toml", "package.json", "pyproject.toml", "go.mod", ".codesearch.toml"];
    let mut current = start;
    loop {
        if MARKERS.iter().any(|m| current.join(m).exists()) {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start.to_path_buf(),
        }
    }
}
