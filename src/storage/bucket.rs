//! Cloud bucket blob store.
//!
//! Payloads are uploaded with a plain HTTPS `PUT {base}/{id}` carrying
//! `x-amz-acl: public-read`, so any S3-compatible endpoint that accepts
//! presigned or open writes works. There is no retry or resumable upload; a
//! failed transfer surfaces as an error.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::error::{Error, Result};

use super::blob::{file_key, BlobLocation, BlobStore};

/// Default timeout for a single bucket request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Blob store backed by an HTTP object bucket.
#[derive(Debug, Clone)]
pub struct BucketBlobStore {
    client: reqwest::Client,
    base_url: String,
    public_base: String,
}

impl BucketBlobStore {
    /// Create a bucket store.
    ///
    /// `public_base` defaults to `base_url` when the bucket serves reads from
    /// the same origin it accepts writes on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either URL is not an absolute http(s) URL.
    pub fn new(base_url: &str, public_base: Option<&str>) -> Result<Self> {
        let base_url = normalize_base(base_url)?;
        let public_base = match public_base {
            Some(p) => normalize_base(p)?,
            None => base_url.clone(),
        };
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            public_base,
        })
    }

    fn object_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, file_key(id))
    }

    /// Public URL a payload is served from once uploaded.
    #[must_use]
    pub fn public_url(&self, id: &str) -> String {
        format!("{}/{}", self.public_base, file_key(id))
    }
}

fn normalize_base(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| Error::Config(format!("invalid bucket URL {raw}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "bucket URL must be http(s): {raw}"
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

impl BlobStore for BucketBlobStore {
    fn name(&self) -> &'static str {
        "bucket"
    }

    async fn put(&self, id: &str, bytes: &[u8], content_type: &str) -> Result<BlobLocation> {
        let response = self
            .client
            .put(self.object_url(id))
            .header(CONTENT_TYPE, content_type)
            .header("x-amz-acl", "public-read")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Blob(format!("upload of {id} failed ({status}): {body}")));
        }

        tracing::info!(id, size = bytes.len(), "uploaded blob to bucket");
        Ok(BlobLocation {
            id: id.to_string(),
            url: Some(self.public_url(id)),
            size: bytes.len() as u64,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let response = self.client.get(self.public_url(id)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            s => Err(Error::Blob(format!("download of {id} failed ({s})"))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let response = self.client.delete(self.object_url(id)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(Error::Blob(format!("delete of {id} failed ({s})"))),
        }
    }
}
