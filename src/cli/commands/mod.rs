//! Command implementations.

pub mod backup;
pub mod completions;
pub mod files;
pub mod items;
pub mod metadata;
pub mod notes;
pub mod serve;
pub mod version;

use crate::cli::Cli;
use crate::config::{resolve_store_kind, resolve_store_path, BlobConfig};
use crate::error::{Error, Result};
use crate::library::Library;
use crate::storage::open_store;

/// Open the library the global flags point at.
///
/// # Errors
///
/// Returns config errors for unresolvable paths or store errors on open.
pub fn open_library(cli: &Cli) -> Result<Library> {
    let kind = resolve_store_kind(cli.store_kind)?;
    let path = resolve_store_path(cli.store.as_deref(), kind)?;
    let store = open_store(kind, &path)?;
    tracing::debug!(store = %store.describe(), "opened store");

    let blobs = BlobConfig::resolve(cli.blob_dir.as_deref(), cli.bucket_url.as_deref())?;
    Ok(Library::new(store).with_blobs(blobs.open()?))
}

/// Runtime for commands that touch the network or blob storage.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

/// Truncate to `max` characters with an ellipsis.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("稍后阅读稍后阅读", 4), "稍后阅…");
    }
}
