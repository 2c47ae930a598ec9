//! Backup export.
//!
//! A backup is one JSON document:
//!
//! ```json
//! {"version":2,"exportedAt":"2025-01-20T10:00:00.000Z","items":[...],
//!  "notes":{"<mode>":{"<id>":[...]}},"files":{"<id>":"<base64>"}}
//! ```
//!
//! Item notes are written once, in the top-level `notes` tree keyed by mode
//! and item id, not inside the items. `files` is present only when payloads
//! were requested; it carries every EPUB and audio payload the blob store
//! holds for the exported items.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::library::Library;
use crate::model::{Item, ItemNote, Mode};
use crate::sync::file::{atomic_write, file_size};
use crate::sync::types::ExportStats;

/// Current backup format version.
pub const EXPORT_VERSION: u32 = 2;

/// The backup document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub exported_at: String,
    pub items: Vec<Item>,
    /// Notes by mode, then item id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, BTreeMap<String, Vec<ItemNote>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,
}

/// Default backup file name for a date: `info-filter-backup-YYYY-MM-DD.json`.
#[must_use]
pub fn default_export_name(date: NaiveDate) -> String {
    format!("info-filter-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Default backup path in `dir` for today's date.
#[must_use]
pub fn default_export_path(dir: &Path) -> PathBuf {
    dir.join(default_export_name(Utc::now().date_naive()))
}

/// Builds and writes backup documents from a library.
pub struct Exporter<'a> {
    library: &'a Library,
    with_files: bool,
}

impl<'a> Exporter<'a> {
    /// Create an exporter. With `with_files`, payloads are read from the
    /// library's blob store and embedded as base64.
    #[must_use]
    pub fn new(library: &'a Library, with_files: bool) -> Self {
        Self {
            library,
            with_files,
        }
    }

    /// Build the document in memory.
    ///
    /// # Errors
    ///
    /// Returns store errors, or blob errors while reading payloads.
    pub async fn build(&self) -> Result<(ExportDocument, ExportStats)> {
        let mut items = self.library.items()?;
        let mut notes: BTreeMap<String, BTreeMap<String, Vec<ItemNote>>> = BTreeMap::new();
        for item in items.iter_mut().filter(|i| !i.notes.is_empty()) {
            let mode = Mode::from_platform(&item.platform);
            notes
                .entry(mode.as_str().to_string())
                .or_default()
                .insert(item.id.clone(), std::mem::take(&mut item.notes));
        }
        let mut stats = ExportStats {
            items: items.len(),
            ..ExportStats::default()
        };

        let files = if self.with_files {
            let mut files = BTreeMap::new();
            for item in items.iter().filter(|i| i.has_file()) {
                let payload = match self.library.blobs() {
                    Some(blobs) => blobs.get(&item.id).await?,
                    None => None,
                };
                match payload {
                    Some(bytes) => {
                        files.insert(
                            item.id.clone(),
                            base64::engine::general_purpose::STANDARD.encode(bytes),
                        );
                    }
                    None => {
                        tracing::warn!(id = %item.id, "no stored file for item; exporting metadata only");
                        stats.missing_files += 1;
                    }
                }
            }
            stats.files = files.len();
            Some(files)
        } else {
            None
        };

        let doc = ExportDocument {
            version: EXPORT_VERSION,
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            items,
            notes,
            files,
        };
        Ok((doc, stats))
    }

    /// Build the document and write it atomically to `path`.
    ///
    /// # Errors
    ///
    /// Returns build errors or the write error.
    pub async fn export_to(&self, path: &Path) -> Result<ExportStats> {
        let (doc, mut stats) = self.build().await?;
        let content = serde_json::to_string_pretty(&doc)?;
        atomic_write(path, &content)?;
        stats.bytes = file_size(path);
        tracing::info!(path = %path.display(), items = stats.items, files = stats.files, "exported backup");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlobStore, BoxedBlobStore, FsBlobStore, MemoryStore};
    use tempfile::TempDir;

    #[test]
    fn test_default_export_name() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(default_export_name(date), "info-filter-backup-2025-03-07.json");
    }

    #[tokio::test]
    async fn test_build_without_files_omits_key() {
        let lib = Library::new(Box::new(MemoryStore::with_items(vec![Item::new(
            "https://example.com",
            "Example",
        )])));
        let (doc, stats) = Exporter::new(&lib, false).build().await.unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(stats.items, 1);

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("files").is_none());
        assert!(json["exportedAt"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_build_with_files_embeds_payloads() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path());

        let mut book = Item::new("", "Book");
        book.id = "book1".into();
        book.has_epub_file = Some(true);
        let mut missing = Item::new("", "Gone");
        missing.id = "gone".into();
        missing.has_audio_file = Some(true);
        blobs.put("book1", b"PNG", "application/epub+zip").await.unwrap();

        let lib = Library::new(Box::new(MemoryStore::with_items(vec![book, missing])))
            .with_blobs(BoxedBlobStore::new(blobs));
        let (doc, stats) = Exporter::new(&lib, true).build().await.unwrap();

        let files = doc.files.unwrap();
        assert_eq!(files.get("book1").map(String::as_str), Some("UE5H"));
        assert_eq!(stats.files, 1);
        assert_eq!(stats.missing_files, 1);
    }

    #[tokio::test]
    async fn test_notes_are_written_by_mode_and_id() {
        let mut paper = Item::new("https://arxiv.org/abs/1", "Paper");
        paper.id = "p1".into();
        paper.platform = "Paper".into();
        paper.notes.push(ItemNote::new("summary", "# Key idea"));
        let lib = Library::new(Box::new(MemoryStore::with_items(vec![
            paper,
            Item::new("https://example.com", "plain"),
        ])));

        let (doc, _) = Exporter::new(&lib, false).build().await.unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["notes"]["paper"]["p1"][0]["title"], "summary");
        assert_eq!(json["notes"]["paper"]["p1"][0]["preview"], "Key idea");
        assert!(json["items"][0].get("notes").is_none());
        assert_eq!(lib.notes("p1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_export_to_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.json");
        let lib = Library::new(Box::new(MemoryStore::new()));

        let stats = Exporter::new(&lib, false).export_to(&path).await.unwrap();
        assert!(stats.bytes > 0);
        let doc: ExportDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc.items.is_empty());
    }
}
