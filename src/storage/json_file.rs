//! Desktop key-value JSON document.
//!
//! The desktop host keeps its state in a single `config.json` shaped like
//! `{"items": [...]}`. Other top-level keys belong to other features and are
//! carried through untouched on every write.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::Item;
use crate::sync::atomic_write;

use super::{decode_items, ItemStore};

const ITEMS_KEY: &str = "items";

/// Item store backed by a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store for the document at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(self.corrupt("top level is not an object")),
            Err(e) => Err(self.corrupt(&e.to_string())),
        }
    }

    fn corrupt(&self, message: &str) -> Error {
        Error::CorruptStore {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

impl ItemStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Item>> {
        let mut doc = self.read_document()?;
        let entries = match doc.remove(ITEMS_KEY) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(self.corrupt("items is not an array")),
        };
        Ok(decode_items(entries, &self.describe()))
    }

    fn store(&mut self, items: &[Item]) -> Result<()> {
        let mut doc = self.read_document()?;
        doc.insert(ITEMS_KEY.to_string(), serde_json::to_value(items)?);
        let content = serde_json::to_string_pretty(&Value::Object(doc))?;
        atomic_write(&self.path, &content)?;
        tracing::debug!(path = %self.path.display(), count = items.len(), "wrote item document");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(&dir.path().join("config.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"windowBounds":{"w":800},"items":[]}"#).unwrap();

        let mut store = JsonFileStore::new(&path);
        store.save_item(Item::new("https://example.com", "Example")).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["windowBounds"]["w"], 800);
        assert_eq!(doc["items"][0]["title"], "Example");
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_document_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::CorruptStore { .. }));
    }

    #[test]
    fn test_entry_without_id_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"items":[{"id":"a","title":"kept"},{"title":"no id"},42,{"id":"b"}]}"#,
        )
        .unwrap();

        let items = JsonFileStore::new(&path).load().unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(items[0].title, "kept");
    }

    #[test]
    fn test_items_not_an_array_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"items":{"id":"a"}}"#).unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::CorruptStore { .. }));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("config.json");
        let mut store = JsonFileStore::new(&path);
        store.update_items(vec![Item::new("", "note")]).unwrap();
        assert!(path.exists());
    }
}
