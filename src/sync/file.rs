//! Atomic file operations.
//!
//! Store documents and backups are always rewritten whole:
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - Reads report a missing file distinctly from a malformed one

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::sync::types::{SyncError, SyncResult};

/// Temp path used while writing `path`: the same name with `.tmp` appended.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file (same path with `.tmp` appended)
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    let temp_path = temp_path(path);

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // Write to temp file
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        // Sync to disk before rename
        writer.get_ref().sync_all()?;
    }

    // Atomic rename
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Read and parse a JSON document.
///
/// # Errors
///
/// Returns [`SyncError::FileNotFound`] if the file does not exist, or the
/// IO/JSON error.
pub fn read_json(path: &Path) -> SyncResult<Value> {
    if !path.exists() {
        return Err(SyncError::FileNotFound(path.display().to_string()));
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Get the size of a file in bytes.
///
/// Returns 0 if the file doesn't exist.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
