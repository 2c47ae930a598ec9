//! Sync and backup operations.
//!
//! Two ways items move between copies of the library:
//!
//! - **Live sync**: a host runs a [`SyncHub`] behind the local server; clients
//!   ([`SyncClient`]) speak the flat [`Message`] protocol over one WebSocket
//!   and adopt every full-array `items-updated` push.
//! - **Backups**: [`Exporter`] writes a versioned JSON document, optionally
//!   with base64 payloads; [`Importer`] reads it back.
//!
//! Both paths combine arrays with the single [`resolve`] function under a
//! [`MergePolicy`].
//!
//! # Example
//!
//! ```ignore
//! use info_filter::sync::{Exporter, Importer, MergePolicy};
//!
//! Exporter::new(&library, true).export_to(&path).await?;
//! let stats = Importer::new(&mut library, MergePolicy::PreferIncoming)
//!     .import_file(&path)
//!     .await?;
//! ```

mod client;
mod export;
mod file;
mod hash;
mod hub;
mod import;
mod merge;
mod protocol;
mod types;

// Re-export main types and functions
pub use client::{ws_url, ConnectionState, SyncClient, DEFAULT_CONNECT_TIMEOUT};
pub use export::{
    default_export_name, default_export_path, ExportDocument, Exporter, EXPORT_VERSION,
};
pub use file::{atomic_write, file_size, read_json};
pub use hash::{content_hash, has_changed};
pub use hub::SyncHub;
pub use import::{parse_import, read_import, ImportPayload, Importer};
pub use merge::resolve;
pub use protocol::Message;
pub use types::{ExportStats, ImportStats, MergePolicy, MergeStats, SyncError, SyncResult};
