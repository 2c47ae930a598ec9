//! Configuration management.
//!
//! Every setting resolves the same way:
//! 1. Explicit CLI flag
//! 2. `IFL_*` environment variable
//! 3. Platform default from `directories`
//!
//! The default JSON store lives where the desktop app keeps its settings
//! (`<config>/info-filter-desktop/config.json`) so the CLI and the desktop app
//! share one library.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::{BoxedBlobStore, BucketBlobStore, FsBlobStore, StoreKind};

/// Default bind address for `ifl serve`.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default port for `ifl serve`.
pub const DEFAULT_PORT: u16 = 3000;

const DESKTOP_APP_DIR: &str = "info-filter-desktop";
const DATA_DIR: &str = "info-filter";

/// Read a non-empty environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check if test mode is enabled.
///
/// Set `IFL_TEST_STORE=1` to keep CLI experiments away from the real library.
#[must_use]
pub fn is_test_mode() -> bool {
    env_var("IFL_TEST_STORE").is_some_and(|v| v != "0" && v.to_lowercase() != "false")
}

/// Directory holding the desktop app's settings (and the default JSON store).
#[must_use]
pub fn desktop_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.config_dir().join(DESKTOP_APP_DIR))
}

/// Directory for CLI-owned data (SQLite store, blobs, test store).
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.data_dir().join(DATA_DIR))
}

/// Platform default store path for a backend kind.
#[must_use]
pub fn default_store_path(kind: StoreKind) -> Option<PathBuf> {
    if is_test_mode() {
        let file = match kind {
            StoreKind::Sqlite => "items.db",
            StoreKind::Json | StoreKind::Memory => "config.json",
        };
        return data_dir().map(|d| d.join("test").join(file));
    }
    match kind {
        StoreKind::Sqlite => data_dir().map(|d| d.join("items.db")),
        StoreKind::Json | StoreKind::Memory => desktop_config_dir().map(|d| d.join("config.json")),
    }
}

/// Resolve the store backend.
///
/// # Errors
///
/// Returns an error if `IFL_STORE_KIND` names an unknown backend.
pub fn resolve_store_kind(explicit: Option<StoreKind>) -> Result<StoreKind> {
    if let Some(kind) = explicit {
        return Ok(kind);
    }
    match env_var("IFL_STORE_KIND") {
        Some(raw) => raw.parse().map_err(Error::Config),
        None => Ok(StoreKind::default()),
    }
}

/// Resolve the store path.
///
/// # Errors
///
/// Returns an error if no platform directory can be determined.
pub fn resolve_store_path(explicit: Option<&Path>, kind: StoreKind) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env_var("IFL_STORE") {
        return Ok(PathBuf::from(path));
    }
    default_store_path(kind)
        .ok_or_else(|| Error::Config("cannot determine a home directory for the store".to_string()))
}

/// Where binary payloads go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobConfig {
    /// Local directory.
    Dir(PathBuf),
    /// HTTP object-storage bucket.
    Bucket {
        url: String,
        public_url: Option<String>,
    },
}

impl BlobConfig {
    /// Resolve blob storage. A bucket URL wins over any directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no platform directory can be determined.
    pub fn resolve(explicit_dir: Option<&Path>, explicit_bucket: Option<&str>) -> Result<Self> {
        if let Some(url) = explicit_bucket.map(str::to_string).or_else(|| env_var("IFL_BUCKET_URL")) {
            return Ok(Self::Bucket {
                url,
                public_url: env_var("IFL_BUCKET_PUBLIC_URL"),
            });
        }
        if let Some(dir) = explicit_dir {
            return Ok(Self::Dir(dir.to_path_buf()));
        }
        if let Some(dir) = env_var("IFL_BLOB_DIR") {
            return Ok(Self::Dir(PathBuf::from(dir)));
        }
        let base = data_dir()
            .ok_or_else(|| Error::Config("cannot determine a data directory for blobs".to_string()))?;
        let dir = if is_test_mode() {
            base.join("test").join("blobs")
        } else {
            base.join("blobs")
        };
        Ok(Self::Dir(dir))
    }

    /// Build the configured blob store.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket URL is invalid.
    pub fn open(&self) -> Result<BoxedBlobStore> {
        match self {
            Self::Dir(dir) => Ok(BoxedBlobStore::new(FsBlobStore::new(dir))),
            Self::Bucket { url, public_url } => Ok(BoxedBlobStore::new(BucketBlobStore::new(
                url,
                public_url.as_deref(),
            )?)),
        }
    }
}

impl std::fmt::Display for BlobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dir(dir) => write!(f, "dir:{}", dir.display()),
            Self::Bucket { url, .. } => write!(f, "bucket:{url}"),
        }
    }
}

/// Resolve the server bind address.
///
/// # Errors
///
/// Returns an error if the host or `IFL_PORT` cannot be parsed.
pub fn resolve_bind_addr(host: Option<&str>, port: Option<u16>) -> Result<SocketAddr> {
    let host = host
        .map(str::to_string)
        .or_else(|| env_var("IFL_HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match port {
        Some(p) => p,
        None => match env_var("IFL_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("IFL_PORT is not a port number: {raw}")))?,
            None => DEFAULT_PORT,
        },
    };
    let ip = host
        .parse::<std::net::IpAddr>()
        .map_err(|_| Error::Config(format!("invalid bind host: {host}")))?;
    Ok(SocketAddr::new(ip, port))
}

/// Resolve the static mobile bundle directory, if any.
#[must_use]
pub fn resolve_static_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_var("IFL_STATIC_DIR").map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_store_path_wins() {
        let explicit = PathBuf::from("/custom/items.json");
        let result = resolve_store_path(Some(&explicit), StoreKind::Json).unwrap();
        assert_eq!(result, explicit);
    }

    #[test]
    fn test_explicit_store_kind_wins() {
        assert_eq!(
            resolve_store_kind(Some(StoreKind::Sqlite)).unwrap(),
            StoreKind::Sqlite
        );
    }

    #[test]
    fn test_default_store_paths() {
        if is_test_mode() {
            return;
        }
        let json = default_store_path(StoreKind::Json).unwrap();
        assert!(json.ends_with("info-filter-desktop/config.json"));
        let sqlite = default_store_path(StoreKind::Sqlite).unwrap();
        assert!(sqlite.ends_with("info-filter/items.db"));
    }

    #[test]
    fn test_explicit_bind_addr() {
        let addr = resolve_bind_addr(Some("127.0.0.1"), Some(8080)).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
        assert!(resolve_bind_addr(Some("not a host"), Some(1)).is_err());
    }

    #[test]
    fn test_explicit_blob_dir() {
        let dir = PathBuf::from("/tmp/blobs");
        let config = BlobConfig::resolve(Some(&dir), None).unwrap();
        if std::env::var("IFL_BUCKET_URL").is_err() {
            assert_eq!(config, BlobConfig::Dir(dir));
        }
    }

    #[test]
    fn test_explicit_bucket_wins() {
        let config = BlobConfig::resolve(None, Some("https://bucket.example.com")).unwrap();
        assert!(matches!(config, BlobConfig::Bucket { ref url, .. } if url == "https://bucket.example.com"));
        assert_eq!(config.open().unwrap().name(), "bucket");
    }
}
