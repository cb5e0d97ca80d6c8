//! Path normalization, traversal rejection, symlink detection, and the
//! project-identity hash. Generalizes the teacher's single-purpose
//! `validate_path` (`server/src/types.rs`) into the full safe-join contract.

use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

#[cfg(windows)]
pub const MAX_PATH_LEN: usize = 260;
#[cfg(not(windows))]
pub const MAX_PATH_LEN: usize = 4096;

/// Normalize a path: NFC-normalize unicode, convert backslashes to forward
/// slashes on Windows, and strip a trailing separator.
pub fn normalize(path: &str) -> String {
    let nfc: String = path.nfc().collect();
    #[cfg(windows)]
    let nfc = nfc.replace('\\', "/");
    let trimmed = nfc.trim_end_matches('/');
    if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
}

/// Convert an absolute path to a forward-slash relative path under `base`.
/// Returns `None` if `abs` does not lie under `base`.
pub fn to_relative(base: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(base).ok()?;
    let s = rel.to_string_lossy().replace('\\', "/");
    Some(s)
}

pub fn to_absolute(base: &Path, rel: &str) -> PathBuf {
    base.join(rel)
}

/// Directory-prefix containment check. Case-insensitive on Windows.
pub fn is_within_directory(path: &Path, base: &Path) -> bool {
    #[cfg(windows)]
    {
        let p = path.to_string_lossy().to_lowercase();
        let b = base.to_string_lossy().to_lowercase();
        Path::new(&p).starts_with(Path::new(&b))
    }
    #[cfg(not(windows))]
    {
        path.starts_with(base)
    }
}

/// Validate and join a relative path segment onto `base`. Rejects any input
/// that is absolute, contains a `..` component, a drive letter, a null byte,
/// or exceeds the platform path-length cap, or whose resolved result escapes
/// `base`. Input is NFC-normalized before any check.
pub fn safe_join(base: &Path, candidate: &str) -> Result<PathBuf, &'static str> {
    if candidate.is_empty() {
        return Err("empty path");
    }
    if candidate.len() > MAX_PATH_LEN || candidate.contains('\0') {
        return Err("path too long or contains a null byte");
    }
    let normalized: String = candidate.nfc().collect();
    let normalized = normalized.replace('\\', "/");

    if normalized.starts_with('/') {
        return Err("absolute paths are not allowed");
    }
    // Drive letter, e.g. "C:/..."
    let bytes = normalized.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return Err("drive-letter paths are not allowed");
    }

    let rel_path = Path::new(&normalized);
    for comp in rel_path.components() {
        match comp {
            Component::ParentDir => return Err("path traversal ('..') is not allowed"),
            Component::RootDir | Component::Prefix(_) => {
                return Err("absolute paths are not allowed")
            }
            _ => {}
        }
    }

    let joined = base.join(rel_path);
    if !is_within_directory(&joined, base) {
        return Err("resolved path escapes the base directory");
    }
    Ok(joined)
}

/// `stat`-without-following-symlinks check: true if `path` itself is a
/// symlink (regardless of whether the link target exists).
pub fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).map(|m| m.file_type().is_symlink()).unwrap_or(false)
}

/// 32-hex-character project identity key: SHA-256 over the case-normalized
/// (lowercased on Windows, slashes forward, trailing separator stripped)
/// absolute project path, truncated to 128 bits.
pub fn hash_project_path(absolute_path: &Path) -> String {
    hex::encode(&project_path_digest(absolute_path)[..16])
}

/// Legacy 16-hex-character form, recognized on read for backward
/// compatibility with indexes created before the 32-hex scheme.
pub fn hash_project_path_legacy(absolute_path: &Path) -> String {
    hex::encode(&project_path_digest(absolute_path)[..8])
}

fn project_path_digest(absolute_path: &Path) -> [u8; 32] {
    let mut s = absolute_path.to_string_lossy().replace('\\', "/");
    #[cfg(windows)]
    {
        s = s.to_lowercase();
    }
    let s = s.trim_end_matches('/');
    let normalized: String = s.nfc().collect();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.finalize().into()
}

/// Resolve the index directory for `project_root` under `indexes_root`,
/// preferring an existing legacy (16-hex) directory over minting a new
/// 32-hex one.
pub fn index_path_for_project(indexes_root: &Path, project_root: &Path) -> PathBuf {
    let legacy = indexes_root.join(hash_project_path_legacy(project_root));
    if legacy.is_dir() {
        return legacy;
    }
    indexes_root.join(hash_project_path(project_root))
}
