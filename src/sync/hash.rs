//! Content hashing for merge change detection.
//!
//! Hashing the serialized JSON of an item tells whether an incoming copy
//! differs from the local one without comparing every field.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute a SHA256 hash of a serializable value.
///
/// The value is first serialized to JSON, then hashed. Values that fail to
/// serialize hash as the empty document.
#[must_use]
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check if an entity has changed.
///
/// Returns `true` if there is no previous hash or the hashes differ.
#[must_use]
pub fn has_changed(current_hash: &str, previous_hash: Option<&str>) -> bool {
    previous_hash.is_none_or(|h| h != current_hash)
}
