//! Persistence layer for info-filter.
//!
//! Items live in a single ordered array. Every backend persists that array
//! as one document and every mutation rewrites it whole, the way the desktop
//! host always has. Binary payloads (EPUB books, audio files) are kept out
//! of the array in a separate blob store.
//!
//! # Submodules
//!
//! - [`json_file`] - Desktop key-value JSON document
//! - [`sqlite`] - SQLite key-value table
//! - [`memory`] - In-process store for ephemeral clients and tests
//! - [`blob`] - Blob store trait and filesystem backend
//! - [`bucket`] - Cloud bucket blob backend
//! - [`schema`] - SQLite schema definitions

pub mod blob;
pub mod bucket;
pub mod json_file;
pub mod memory;
pub mod schema;
pub mod sqlite;

use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{partition_pinned, Item};

pub use blob::{BlobLocation, BlobStore, BoxedBlobStore, FsBlobStore};
pub use bucket::BucketBlobStore;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// An ordered, whole-array item store.
///
/// Backends implement [`ItemStore::load`] and [`ItemStore::store`]; the item
/// operations are provided on top of them and each returns the full array
/// after the operation. There are no multi-item transactions: concurrent
/// `update_items` calls are last-writer-wins.
pub trait ItemStore: Send + Sync {
    /// Read the full array in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing document cannot be read or parsed.
    fn load(&self) -> Result<Vec<Item>>;

    /// Overwrite the full array.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing document cannot be written.
    fn store(&mut self, items: &[Item]) -> Result<()>;

    /// Short human description of where items live.
    fn describe(&self) -> String;

    /// Full array in stored order.
    ///
    /// # Errors
    ///
    /// Propagates [`ItemStore::load`] errors.
    fn get_items(&self) -> Result<Vec<Item>> {
        self.load()
    }

    /// Prepend an item. Ids are not checked for uniqueness.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn save_item(&mut self, item: Item) -> Result<Vec<Item>> {
        let mut items = self.load()?;
        items.insert(0, item);
        self.store(&items)?;
        Ok(items)
    }

    /// Remove every item with `id`. Absent ids leave the array unchanged.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn delete_item(&mut self, id: &str) -> Result<Vec<Item>> {
        let mut items = self.load()?;
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() != before {
            self.store(&items)?;
        }
        Ok(items)
    }

    /// Overwrite the whole array.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn update_items(&mut self, items: Vec<Item>) -> Result<Vec<Item>> {
        self.store(&items)?;
        Ok(items)
    }

    /// Replace the stored entry that has the same id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemNotFound`] if no entry has that id.
    fn update_item(&mut self, item: Item) -> Result<Vec<Item>> {
        let mut items = self.load()?;
        let slot = items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| Error::ItemNotFound { id: item.id.clone() })?;
        *slot = item;
        self.store(&items)?;
        Ok(items)
    }

    /// Flip `pinned` and move pinned items ahead, keeping stored order
    /// otherwise. Unknown ids return the array unchanged.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn toggle_pin(&mut self, id: &str) -> Result<Vec<Item>> {
        let mut items = self.load()?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(items);
        };
        item.pinned = !item.pinned;
        partition_pinned(&mut items);
        self.store(&items)?;
        Ok(items)
    }
}

/// Which item-store backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    /// Desktop key-value JSON document.
    #[default]
    Json,
    /// SQLite key-value table.
    Sqlite,
    /// Process-local, nothing persisted.
    Memory,
}

impl StoreKind {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" | "db" => Ok(Self::Sqlite),
            "memory" | "mem" => Ok(Self::Memory),
            _ => Err(format!("Unknown store kind: {s} (expected json, sqlite, memory)")),
        }
    }
}

/// Decode a stored item array one entry at a time.
///
/// A malformed entry (no id, not an object) is skipped with a warning
/// instead of hiding the rest of the library.
pub(crate) fn decode_items(entries: Vec<serde_json::Value>, origin: &str) -> Vec<Item> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Item>(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(origin, index, error = %e, "skipping unreadable item");
                None
            }
        })
        .collect()
}

/// Open the item store of the given kind at `path`.
///
/// # Errors
///
/// Returns an error if the SQLite database cannot be opened.
pub fn open_store(kind: StoreKind, path: &Path) -> Result<Box<dyn ItemStore>> {
    tracing::debug!(kind = %kind, path = %path.display(), "opening item store");
    Ok(match kind {
        StoreKind::Json => Box::new(JsonFileStore::new(path)),
        StoreKind::Sqlite => Box::new(SqliteStore::open(path)?),
        StoreKind::Memory => Box::new(MemoryStore::new()),
    })
}
