//! SQLite item store.
//!
//! Keeps the desktop key-value document as rows of a `kv` table, with the
//! item array stored as JSON text under the `items` key. Writes go through an
//! IMMEDIATE transaction so concurrent writers serialize on the database lock.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::error::{Error, Result};
use crate::model::{now_millis, Item};
use crate::storage::schema::{apply_schema, ITEMS_KEY};

use super::{decode_items, ItemStore};

/// SQLite-based item store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("sqlite connection lock poisoned".to_string()))
    }

    /// Read a raw value from the key-value table.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Write a raw value into the key-value table.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        self.mutate(|tx| {
            upsert(tx, key, value)?;
            Ok(())
        })
    }

    /// Run `f` inside an IMMEDIATE transaction, committing on success.
    fn mutate<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let conn = self
            .conn
            .get_mut()
            .map_err(|_| Error::Other("sqlite connection lock poisoned".to_string()))?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

fn upsert(tx: &Transaction, key: &str, value: &str) -> rusqlite::Result<usize> {
    tx.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::params![key, value, now_millis()],
    )
}

impl ItemStore for SqliteStore {
    fn load(&self) -> Result<Vec<Item>> {
        let corrupt = |message: String| Error::CorruptStore {
            path: self.path.clone().unwrap_or_default(),
            message,
        };
        let Some(raw) = self.get_value(ITEMS_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(entries)) => Ok(decode_items(entries, &self.describe())),
            Ok(_) => Err(corrupt("items is not an array".to_string())),
            Err(e) => Err(corrupt(e.to_string())),
        }
    }

    fn store(&mut self, items: &[Item]) -> Result<()> {
        let raw = serde_json::to_string(items)?;
        self.set_value(ITEMS_KEY, &raw)
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite::memory:".to_string(),
        }
    }
}
