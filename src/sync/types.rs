//! Sync types shared by live sync, export and import.

use serde::Serialize;

use crate::error::Error;

/// How incoming items combine with the local array.
///
/// Every path that brings items in from elsewhere (host pushes, backup
/// imports) goes through [`crate::sync::resolve`] with one of these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Result is exactly the incoming array (host wins, empty clears).
    Replace,
    /// Union keyed by id; incoming entries win. Result in display order.
    #[default]
    PreferIncoming,
    /// Union keyed by id; local entries win. Result in display order.
    PreferLocal,
}

impl MergePolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::PreferIncoming => "prefer-incoming",
            Self::PreferLocal => "prefer-local",
        }
    }
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-merge counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Incoming ids not present locally.
    pub created: usize,
    /// Incoming entries that replaced a different local entry.
    pub updated: usize,
    /// Incoming entries identical to the local entry.
    pub unchanged: usize,
    /// Incoming entries ignored because the local entry won.
    pub skipped: usize,
    /// Local-only entries carried into the result.
    pub kept: usize,
    /// Local entries absent from the result.
    pub removed: usize,
}

impl MergeStats {
    /// Total incoming entries processed.
    #[must_use]
    pub fn total_incoming(&self) -> usize {
        self.created + self.updated + self.unchanged + self.skipped
    }

    /// Whether the merge changed anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Statistics for an export operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    /// Items written.
    pub items: usize,
    /// File payloads embedded as base64.
    pub files: usize,
    /// Items flagged with a payload that the blob store did not have.
    pub missing_files: usize,
    /// Size of the written document in bytes.
    pub bytes: u64,
}

/// Statistics for an import operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    /// Item merge counters.
    pub items: MergeStats,
    /// File payloads written to the blob store.
    pub files_restored: usize,
    /// File payloads that were not restored.
    pub files_skipped: usize,
    /// Markdown notes attached from the backup's notes tree.
    pub notes_restored: usize,
    /// Items in the store after the import.
    pub total: usize,
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backup or store file not found.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The document is valid JSON but not an accepted shape.
    #[error("Unsupported format: {0}")]
    InvalidFormat(String),

    /// A protocol frame could not be understood.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Transport failure talking to the host.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No reply arrived in time.
    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<SyncError> for Error {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Io(e) => Self::Io(e),
            SyncError::Json(e) => Self::Json(e),
            SyncError::InvalidFormat(msg) => Self::InvalidImport(msg),
            SyncError::FileNotFound(path) => {
                Self::InvalidArgument(format!("file not found: {path}"))
            }
            other => Self::Sync(other.to_string()),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_policy_default() {
        assert_eq!(MergePolicy::default(), MergePolicy::PreferIncoming);
    }

    #[test]
    fn test_merge_stats_totals() {
        let stats = MergeStats {
            created: 2,
            updated: 1,
            unchanged: 3,
            skipped: 1,
            kept: 4,
            removed: 0,
        };
        assert_eq!(stats.total_incoming(), 7);
        assert!(!stats.is_noop());
        assert!(MergeStats::default().is_noop());
    }

    #[test]
    fn test_sync_error_maps_to_error_codes() {
        let err: Error = SyncError::InvalidFormat("nope".into()).into();
        assert_eq!(err.exit_code(), 4);
        let err: Error = SyncError::Timeout("pong".into()).into();
        assert_eq!(err.exit_code(), 6);
    }
}
