//! Error types for info-filter.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers and HTTP bodies

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for info-filter operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    StoreError,
    BlobError,

    // Not Found (exit 3)
    ItemNotFound,
    BlobNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidImport,
    InvalidEpub,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Network (exit 9)
    NetworkError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::StoreError => "STORE_ERROR",
            Self::BlobError => "BLOB_ERROR",
            Self::ItemNotFound => "ITEM_NOT_FOUND",
            Self::BlobNotFound => "BLOB_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidImport => "INVALID_IMPORT",
            Self::InvalidEpub => "INVALID_EPUB",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::StoreError | Self::BlobError => 2,
            Self::ItemNotFound | Self::BlobNotFound => 3,
            Self::InvalidArgument | Self::InvalidImport | Self::InvalidEpub => 4,
            Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::NetworkError => 9,
        }
    }

    /// HTTP status used when the error crosses the local server boundary.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::ItemNotFound | Self::BlobNotFound => 404,
            Self::InvalidArgument | Self::InvalidImport | Self::InvalidEpub | Self::JsonError => {
                400
            }
            Self::NetworkError => 502,
            _ => 500,
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in info-filter operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Item not found: {id}")]
    ItemNotFound { id: String },

    #[error("No stored file for item: {id}")]
    BlobNotFound { id: String },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("Store file is corrupt: {path}: {message}")]
    CorruptStore { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid import file: {0}")]
    InvalidImport(String),

    #[error("Invalid EPUB: {0}")]
    Epub(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ItemNotFound { .. } => ErrorCode::ItemNotFound,
            Self::BlobNotFound { .. } => ErrorCode::BlobNotFound,
            Self::Store(_) | Self::CorruptStore { .. } => ErrorCode::StoreError,
            Self::Blob(_) => ErrorCode::BlobError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Http(_) => ErrorCode::NetworkError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::InvalidImport(_) => ErrorCode::InvalidImport,
            Self::Epub(_) => ErrorCode::InvalidEpub,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ItemNotFound { id } => Some(format!(
                "No item with ID '{id}'. Use `ifl list` to see saved items."
            )),
            Self::BlobNotFound { id } => Some(format!(
                "Item '{id}' has no stored file. It may have been imported without `files`."
            )),
            Self::CorruptStore { path, .. } => Some(format!(
                "Fix or move {} aside; `ifl import` can restore from a backup.",
                path.display()
            )),
            Self::InvalidImport(_) => Some(
                "Import files must be a JSON array of items, or an object with an `items` array or a `flowData` document."
                    .to_string(),
            ),
            Self::Epub(_) => Some(
                "Make sure the file is a valid .epub (a zip with META-INF/container.xml)."
                    .to_string(),
            ),
            Self::Sync(_) => Some(
                "Check that `ifl serve` is running on the host and reachable on the LAN."
                    .to_string(),
            ),
            Self::Config(msg) if msg.contains("bucket") => Some(
                "Set IFL_BUCKET_URL (and optionally IFL_BUCKET_PUBLIC_URL) or use --blob-dir."
                    .to_string(),
            ),
            Self::InvalidArgument(msg) if msg.contains("reorder") => Some(
                "Pass every stored item id exactly once; `ifl list --order stored --silent` prints them."
                    .to_string(),
            ),
            Self::Store(_)
            | Self::Blob(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Http(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, exit code, and optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
