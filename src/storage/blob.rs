//! Blob storage for item payloads.
//!
//! EPUB books and audio files are too large for the item array, so they live
//! beside it keyed by item id. The item only carries `hasEpubFile` /
//! `hasAudioFile` plus, for cloud buckets, the public `fileUrl`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Where a payload ended up after [`BlobStore::put`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobLocation {
    pub id: String,
    /// Public URL, when the backend exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub size: u64,
}

/// Trait for blob backends.
pub trait BlobStore: Send + Sync {
    /// Backend name for logs and status output.
    fn name(&self) -> &'static str;

    /// Store `bytes` under `id`, replacing any previous payload.
    fn put(
        &self,
        id: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> impl Future<Output = Result<BlobLocation>> + Send;

    /// Fetch the payload for `id`, or `None` if there is none.
    fn get(&self, id: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Remove the payload for `id`. Returns whether anything was removed.
    fn delete(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe mirror of [`BlobStore`].
trait BlobStoreBoxed: Send + Sync {
    fn name(&self) -> &'static str;
    fn put_boxed<'a>(
        &'a self,
        id: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<BlobLocation>>;
    fn get_boxed<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>>;
    fn delete_boxed<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<bool>>;
}

struct BoxedBlobStoreWrapper<B: BlobStore + 'static>(B);

impl<B: BlobStore + 'static> BlobStoreBoxed for BoxedBlobStoreWrapper<B> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn put_boxed<'a>(
        &'a self,
        id: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<BlobLocation>> {
        Box::pin(self.0.put(id, bytes, content_type))
    }

    fn get_boxed<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        Box::pin(self.0.get(id))
    }

    fn delete_boxed<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(self.0.delete(id))
    }
}

/// Boxed blob store for runtime backend selection.
///
/// [`BlobStore`] uses `impl Future` returns and is not object-safe; this
/// wrapper erases the concrete backend.
pub struct BoxedBlobStore {
    inner: Box<dyn BlobStoreBoxed>,
}

impl BoxedBlobStore {
    /// Wrap a concrete backend.
    pub fn new<B: BlobStore + 'static>(store: B) -> Self {
        Self {
            inner: Box::new(BoxedBlobStoreWrapper(store)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// See [`BlobStore::put`].
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn put(&self, id: &str, bytes: &[u8], content_type: &str) -> Result<BlobLocation> {
        self.inner.put_boxed(id, bytes, content_type).await
    }

    /// See [`BlobStore::get`].
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get_boxed(id).await
    }

    /// See [`BlobStore::delete`].
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete_boxed(id).await
    }
}

impl std::fmt::Debug for BoxedBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedBlobStore")
            .field("backend", &self.name())
            .finish()
    }
}

/// Blob store keeping one file per item id under a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Path of the payload file for `id`.
    #[must_use]
    pub fn blob_path(&self, id: &str) -> PathBuf {
        self.dir.join(file_key(id))
    }
}

/// Map an item id to a safe object name.
///
/// Generated ids are already safe and map to themselves. Any other id is
/// sanitized and suffixed with a hash of the raw id, so ids that sanitize to
/// the same text still get distinct keys.
pub(crate) fn file_key(id: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !id.is_empty() && id.chars().all(is_safe) {
        return id.to_string();
    }

    let sanitized: String = id
        .chars()
        .map(|c| if is_safe(c) { c } else { '_' })
        .collect();
    let digest = format!("{:x}", Sha256::digest(id.as_bytes()));
    format!("{sanitized}-{}", &digest[..16])
}

impl BlobStore for FsBlobStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn put(&self, id: &str, bytes: &[u8], _content_type: &str) -> Result<BlobLocation> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.blob_path(id);
        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &path).await?;
        tracing::debug!(id, size = bytes.len(), "stored blob");
        Ok(BlobLocation {
            id: id.to_string(),
            url: None,
            size: bytes.len() as u64,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.blob_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Blob(format!("read {id}: {e}"))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Blob(format!("delete {id}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        let loc = store.put("abc", b"payload", "audio/mpeg").await.unwrap();
        assert_eq!(loc.size, 7);
        assert_eq!(store.get("abc").await.unwrap().as_deref(), Some(&b"payload"[..]));

        assert!(store.delete("abc").await.unwrap());
        assert!(!store.delete("abc").await.unwrap());
        assert!(store.get("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_boxed_store_delegates() {
        let dir = TempDir::new().unwrap();
        let store = BoxedBlobStore::new(FsBlobStore::new(dir.path()));
        assert_eq!(store.name(), "fs");
        store.put("x", b"1", "application/epub+zip").await.unwrap();
        assert!(store.get("x").await.unwrap().is_some());
    }

    #[test]
    fn test_file_key_strips_path_separators() {
        let key = file_key("../etc/passwd");
        assert!(key.starts_with("___etc_passwd-"));
        assert!(!key.contains('/') && !key.contains('.'));
        assert_eq!(file_key("lq3k2abc"), "lq3k2abc");
        assert_eq!(file_key("lq3k2abc"), file_key("lq3k2abc"));
        assert!(file_key("").starts_with('-'));
    }

    #[test]
    fn test_file_key_distinguishes_similar_ids() {
        let keys: std::collections::HashSet<String> =
            ["a/b", "a.b", "a_b", "a b"].iter().map(|id| file_key(id)).collect();
        assert_eq!(keys.len(), 4);
    }

    #[tokio::test]
    async fn test_similar_ids_keep_separate_payloads() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("a/b", b"slash", "application/epub+zip").await.unwrap();
        store.put("a.b", b"dot", "application/epub+zip").await.unwrap();

        assert_eq!(store.get("a/b").await.unwrap().as_deref(), Some(&b"slash"[..]));
        assert_eq!(store.get("a.b").await.unwrap().as_deref(), Some(&b"dot"[..]));
        assert!(store.get("a_b").await.unwrap().is_none());
    }
}
