//! Crash-consistent JSON persistence: write to a temp sibling, rename onto the
//! target. Loads enforce a maximum file size before parsing.

use crate::error::{ErrorKind, Result, SearchError};
use serde::{de::DeserializeOwned, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default cap on a loaded JSON file, matching spec §4.3.
pub const DEFAULT_MAX_LOAD_BYTES: u64 = 10 * 1024 * 1024;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `value` as pretty JSON to `path` atomically: write to a temp sibling
/// (suffixed with a monotonic counter and the process id), then rename onto
/// `path`. Removes the temp file best-effort on any failure before rename.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("data.json");
    let tmp_name = format!(".{file_name}.tmp.{pid}.{counter}");
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| -> Result<()> {
        let mut body = serde_json::to_string_pretty(value)
            .map_err(|e| SearchError::index_corrupt(format!("serialize failed: {e}")))?;
        body.push('\n');
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(body.as_bytes())?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        SearchError::from(e)
    })?;
    Ok(())
}

/// Load and parse a JSON file, enforcing `max_bytes` before ever calling into
/// the parser. Returns `Ok(None)` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path, max_bytes: u64) -> Result<Option<T>> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if meta.len() > max_bytes {
        return Err(SearchError::resource_limit(format!(
            "{} exceeds the {max_bytes}-byte load cap ({} bytes)",
            path.display(),
            meta.len()
        )));
    }

    let bytes = std::fs::read(path)?;
    let value = serde_json::from_slice(&bytes)
        .map_err(|e| SearchError::index_corrupt(format!("{}: {e}", path.display())))?;
    Ok(Some(value))
}

/// Same contract as [`save_json`] but for an opaque byte blob (used by the
/// full-text store's serialized index).
pub fn save_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("data.bin");
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp.{pid}.{counter}"));

    let result = (|| -> Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        SearchError::from(e)
    })?;
    Ok(())
}

pub fn load_bytes(path: &Path, max_bytes: u64) -> Result<Option<Vec<u8>>> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if meta.len() > max_bytes {
        return Err(SearchError::new(
            ErrorKind::DiskFull,
            format!("{} exceeds the {max_bytes}-byte load cap", path.display()),
        ));
    }
    Ok(Some(std::fs::read(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn round_trip_preserves_value() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sample.json");
        let value = Sample { a: 7, b: "hi".into() };
        save_json(&path, &value).unwrap();
        let loaded: Option<Sample> = load_json(&path, DEFAULT_MAX_LOAD_BYTES).unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[test]
    fn save_leaves_no_tmp_file_and_ends_with_newline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sample.json");
        save_json(&path, &Sample { a: 1, b: "x".into() }).unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["sample.json".to_string()]);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn load_missing_file_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing.json");
        let loaded: Option<Sample> = load_json(&path, DEFAULT_MAX_LOAD_BYTES).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_rejects_oversized_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.json");
        std::fs::write(&path, vec![b'a'; 1024]).unwrap();
        let result: Result<Option<Sample>> = load_json(&path, 10);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind, ErrorKind::DiskFull);
    }
}
