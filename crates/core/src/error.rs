//! Error taxonomy — a small tagged set with a user-safe message, a developer
//! message, and an optional chained cause. Validation failures use a kind the
//! caller can act on; infrastructure faults are wrapped as `IndexCorrupt` only
//! as a last resort.

use std::fmt;

/// The closed set of error kinds surfaced to MCP tool callers (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IndexNotFound,
    IndexCorrupt,
    FileNotFound,
    PermissionDenied,
    SymlinkNotAllowed,
    InvalidPath,
    InvalidPattern,
    DiskFull,
    ExtractionFailed,
    ProjectNotDetected,
    /// Concurrency violation: another indexing operation is in flight.
    IndexingInProgress,
    /// Request validation failure (query length, alpha range, etc).
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::IndexNotFound => "INDEX_NOT_FOUND",
            ErrorKind::IndexCorrupt => "INDEX_CORRUPT",
            ErrorKind::FileNotFound => "FILE_NOT_FOUND",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::SymlinkNotAllowed => "SYMLINK_NOT_ALLOWED",
            ErrorKind::InvalidPath => "INVALID_PATH",
            ErrorKind::InvalidPattern => "INVALID_PATTERN",
            ErrorKind::DiskFull => "DISK_FULL",
            ErrorKind::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorKind::ProjectNotDetected => "PROJECT_NOT_DETECTED",
            ErrorKind::IndexingInProgress => "INDEXING_IN_PROGRESS",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

/// Structured error carrying both a user-facing and a developer-facing
/// message, plus the kind callers branch on.
#[derive(Debug)]
pub struct SearchError {
    pub kind: ErrorKind,
    pub user_message: String,
    pub dev_message: String,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SearchError {
    pub fn new(kind: ErrorKind, user_message: impl Into<String>) -> Self {
        let user_message = user_message.into();
        Self { kind, dev_message: user_message.clone(), user_message, cause: None }
    }

    pub fn with_dev(mut self, dev_message: impl Into<String>) -> Self {
        self.dev_message = dev_message.into();
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn index_not_found(project_path: &str) -> Self {
        Self::new(
            ErrorKind::IndexNotFound,
            format!("No index found for {project_path}. Run create_index first."),
        )
    }

    pub fn index_corrupt(dev_message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexCorrupt, "The index is corrupt and needs to be rebuilt.")
            .with_dev(dev_message)
    }

    pub fn model_mismatch(stored: &str, stored_dim: usize, current: &str, current_dim: usize) -> Self {
        Self::new(
            ErrorKind::IndexCorrupt,
            format!(
                "The index was built with embedding model '{stored}' ({stored_dim} dims) but the \
                 current configuration expects '{current}' ({current_dim} dims). Run reindex_project \
                 to rebuild the index with the current model."
            ),
        )
    }

    pub fn indexing_in_progress(holder_project_path: &str) -> Self {
        Self::new(
            ErrorKind::IndexingInProgress,
            format!("An indexing operation is already in progress for {holder_project_path}."),
        )
    }

    pub fn invalid_path(reason: &str) -> Self {
        Self::new(ErrorKind::InvalidPath, format!("Invalid path: {reason}"))
    }

    pub fn invalid_pattern(reason: &str) -> Self {
        Self::new(ErrorKind::InvalidPattern, format!("Invalid pattern: {reason}"))
    }

    pub fn resource_limit(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::DiskFull, reason.into())
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.user_message)
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for SearchError {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IndexCorrupt,
        };
        Self::new(kind, "A filesystem error occurred.").with_dev(e.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        Self::index_corrupt(format!("JSON parse error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
