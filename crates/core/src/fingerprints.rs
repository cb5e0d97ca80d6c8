//! Per-file content-hash map, persisted atomically. Presence of an entry
//! means "this version of this file is indexed".

use crate::atomic_store::{self, DEFAULT_MAX_LOAD_BYTES};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Fingerprints {
    /// relative path -> 64-hex SHA-256 of file bytes
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

impl Fingerprints {
    pub fn load(path: &Path) -> Result<Self> {
        match atomic_store::load_json::<Self>(path, DEFAULT_MAX_LOAD_BYTES) {
            Ok(Some(fp)) => Ok(fp),
            Ok(None) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_store::save_json(path, self)
    }

    pub fn get(&self, rel_path: &str) -> Option<&str> {
        self.entries.get(rel_path).map(|s| s.as_str())
    }

    pub fn set(&mut self, rel_path: impl Into<String>, hash: impl Into<String>) {
        self.entries.insert(rel_path.into(), hash.into());
    }

    pub fn remove(&mut self, rel_path: &str) {
        self.entries.remove(rel_path);
    }

    pub fn contains_matching(&self, rel_path: &str, hash: &str) -> bool {
        self.entries.get(rel_path).map(|h| h == hash).unwrap_or(false)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 64-hex SHA-256 of file bytes. Identical across platforms for an identical
/// byte sequence (spec §8 testable property 3).
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
