//! Per-project config: include/exclude globs, size caps, strategy selection.
//! Unknown and `_`-prefixed top-level keys round-trip verbatim.

use crate::atomic_store::{self, DEFAULT_MAX_LOAD_BYTES};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStrategy {
    Eager,
    Lazy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_true", rename = "respectGitignore")]
    pub respect_gitignore: bool,
    #[serde(default = "default_max_file_size", rename = "maxFileSize")]
    pub max_file_size: String,
    #[serde(default = "default_max_files", rename = "maxFiles")]
    pub max_files: usize,
    #[serde(default, rename = "indexingStrategy")]
    pub indexing_strategy: Option<IndexingStrategy>,

    /// Unknown and `_`-prefixed top-level keys, preserved verbatim on save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_max_file_size() -> String {
    "1MB".to_string()
}
fn default_max_files() -> usize {
    50_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
            respect_gitignore: true,
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            indexing_strategy: Some(IndexingStrategy::Eager),
            extra: Map::new(),
        }
    }
}

impl Config {
    /// Parse `maxFileSize` ("1MB", "512KB", …) into bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        parse_size(&self.max_file_size).unwrap_or(1024 * 1024)
    }

    pub fn strategy(&self) -> IndexingStrategy {
        self.indexing_strategy.unwrap_or(IndexingStrategy::Eager)
    }
}

fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim();
    let (num_part, mult) = if let Some(n) = s.strip_suffix("KB") {
        (n, 1024u64)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s, 1)
    };
    num_part.trim().parse::<u64>().ok().map(|n| n * mult)
}

/// Load config.json, tolerating a missing file (returns defaults) and
/// falling back to defaults with a warning on corrupt JSON.
pub fn load(path: &Path) -> Config {
    match atomic_store::load_json::<Config>(path, DEFAULT_MAX_LOAD_BYTES) {
        Ok(Some(cfg)) => cfg,
        Ok(None) => Config::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "config.json is corrupt, using defaults");
            Config::default()
        }
    }
}

pub fn save(path: &Path, config: &Config) -> Result<()> {
    atomic_store::save_json(path, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.include, vec!["**/*"]);
        assert!(cfg.exclude.is_empty());
        assert!(cfg.respect_gitignore);
        assert_eq!(cfg.max_file_size, "1MB");
        assert_eq!(cfg.max_files, 50_000);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = load(&tmp.path().join("config.json"));
        assert_eq!(cfg.max_files, 50_000);
    }

    #[test]
    fn load_corrupt_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let cfg = load(&path);
        assert_eq!(cfg.max_files, 50_000);
    }

    #[test]
    fn round_trip_preserves_unknown_and_underscore_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let mut cfg = Config::default();
        cfg.extra.insert("_comment".to_string(), Value::String("do not edit".into()));
        cfg.extra.insert("futureField".to_string(), Value::Bool(true));
        save(&path, &cfg).unwrap();

        let loaded = load(&path);
        assert_eq!(loaded.extra.get("_comment"), Some(&Value::String("do not edit".into())));
        assert_eq!(loaded.extra.get("futureField"), Some(&Value::Bool(true)));
        assert_eq!(loaded.max_files, cfg.max_files);
    }

    #[test]
    fn max_file_size_bytes_parses_units() {
        let mut cfg = Config::default();
        cfg.max_file_size = "2MB".to_string();
        assert_eq!(cfg.max_file_size_bytes(), 2 * 1024 * 1024);
        cfg.max_file_size = "512KB".to_string();
        assert_eq!(cfg.max_file_size_bytes(), 512 * 1024);
    }
}
