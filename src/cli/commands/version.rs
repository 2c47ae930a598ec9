//! `version`: package version plus where this invocation keeps its data.

use serde::Serialize;

use crate::cli::Cli;
use crate::config::{resolve_store_kind, resolve_store_path, BlobConfig};
use crate::error::Result;

#[derive(Serialize)]
struct VersionOutput {
    version: &'static str,
    store_kind: String,
    store: Option<String>,
    blobs: Option<String>,
}

/// Execute `version`. Nothing is opened; paths are only resolved, and a
/// location that cannot be resolved is reported as `null`.
///
/// # Errors
///
/// Returns an error if `IFL_STORE_KIND` is invalid or JSON serialization fails.
pub fn execute(cli: &Cli, json: bool) -> Result<()> {
    let kind = resolve_store_kind(cli.store_kind)?;
    let store = resolve_store_path(cli.store.as_deref(), kind)
        .ok()
        .map(|p| p.display().to_string());
    let blobs = BlobConfig::resolve(cli.blob_dir.as_deref(), cli.bucket_url.as_deref())
        .ok()
        .map(|b| b.to_string());

    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        store_kind: kind.to_string(),
        store,
        blobs,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let unresolved = || "(unresolved)".to_string();
    println!("ifl {}", output.version);
    println!("  Store: {} {}", output.store_kind, output.store.unwrap_or_else(unresolved));
    println!("  Files: {}", output.blobs.unwrap_or_else(unresolved));
    Ok(())
}
