//! Backup import.
//!
//! Accepts every shape that has been written over time: a bare JSON array
//! of items (web dashboard), the wrapped backup document with `items` and
//! optional `files` / `notes`, and the older desktop document that kept
//! items per mode under `flowData.contents`. Payloads are restored to the
//! blob store before the items are merged, so an item never points at a
//! payload that is not there yet.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use base64::Engine;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::library::{default_content_type, stash_inline_file, Library};
use crate::model::{now_millis, Item, ItemNote, Mode};
use crate::sync::file::read_json;
use crate::sync::types::{ImportStats, MergePolicy, SyncError, SyncResult};

/// Title given to legacy entries saved without one.
const UNTITLED: &str = "未命名";

/// Items, payloads and notes read from a backup.
#[derive(Debug, Clone, Default)]
pub struct ImportPayload {
    pub items: Vec<Item>,
    /// Base64 payloads keyed by item id.
    pub files: BTreeMap<String, String>,
    /// Markdown notes keyed by item id.
    pub notes: BTreeMap<String, Vec<ItemNote>>,
}

fn unsupported_shape() -> SyncError {
    SyncError::InvalidFormat(
        "must be a JSON array or an object with `items` or `flowData`".to_string(),
    )
}

/// Interpret a parsed backup document.
///
/// # Errors
///
/// Returns [`SyncError::InvalidFormat`] if the value is neither an array nor
/// an object with an `items` array or a `flowData` document, or an item
/// cannot be read.
pub fn parse_import(value: Value) -> SyncResult<ImportPayload> {
    let mut doc = match value {
        Value::Array(items) => {
            return Ok(ImportPayload {
                items: read_items(Value::Array(items))?,
                ..ImportPayload::default()
            });
        }
        Value::Object(doc) => doc,
        _ => return Err(unsupported_shape()),
    };

    let flow = doc.remove("flowData");
    let items = match (doc.remove("items"), &flow) {
        (Some(items @ Value::Array(_)), _) => read_items(items)?,
        (Some(_), _) => return Err(unsupported_shape()),
        (None, Some(Value::Object(flow))) => legacy_items(flow),
        (None, _) => return Err(unsupported_shape()),
    };

    let files = match doc.remove("files") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(id, data)| match data {
                Value::String(s) => Some((id, s)),
                _ => None,
            })
            .collect(),
        Some(_) => {
            return Err(SyncError::InvalidFormat(
                "`files` must be an object of base64 strings".to_string(),
            ));
        }
    };

    let notes = match doc.remove("notes") {
        Some(notes @ Value::Object(_)) => read_notes(&notes),
        _ => flow
            .as_ref()
            .and_then(|f| f.get("notes"))
            .map(read_notes)
            .unwrap_or_default(),
    };

    Ok(ImportPayload {
        items,
        files,
        notes,
    })
}

fn read_items(items: Value) -> SyncResult<Vec<Item>> {
    serde_json::from_value(items)
        .map_err(|e| SyncError::InvalidFormat(format!("unreadable item: {e}")))
}

/// Convert `flowData.contents` (`{mode: [content, ...]}`) into items.
///
/// Each content becomes an item in that mode's platform with the
/// `read_later` category, unpinned. Contents without an id are skipped.
fn legacy_items(flow: &Map<String, Value>) -> Vec<Item> {
    let Some(contents) = flow.get("contents").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    for mode in Mode::ALL {
        let Some(entries) = contents.get(mode.as_str()).and_then(Value::as_array) else {
            continue;
        };
        for content in entries {
            match legacy_item(mode, content) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(mode = %mode, error = %e, "skipping legacy entry"),
            }
        }
    }
    tracing::debug!(items = items.len(), "converted legacy flowData contents");
    items
}

fn str_field<'a>(content: &'a Value, key: &str) -> &'a str {
    content.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn legacy_item(mode: Mode, content: &Value) -> SyncResult<Item> {
    let text = |key| str_field(content, key);

    let url = text("url");
    let title = match text("title") {
        "" => UNTITLED,
        title => title,
    };
    let created_at = match content.get("createdAt") {
        None | Some(Value::Null) => json!(now_millis()),
        Some(value) => value.clone(),
    };

    let mut entry = json!({
        "id": content.get("id").cloned().unwrap_or(Value::Null),
        "url": url,
        "title": title,
        "category": "read_later",
        "note": text("note"),
        "image": text("image"),
        "platform": mode.platform_for(url),
        "createdAt": created_at,
        "pinned": false,
    });
    for key in ["author", "hasEpubFile", "hasAudioFile", "fileName", "fileSize"] {
        if let Some(value) = content.get(key).filter(|v| !v.is_null()) {
            entry[key] = value.clone();
        }
    }
    if entry["id"].is_null() {
        return Err(SyncError::InvalidFormat("legacy entry has no id".to_string()));
    }
    Ok(serde_json::from_value(entry)?)
}

/// Read a `{mode: {itemId: [note, ...]}}` notes tree into notes per item id.
/// Unreadable notes are skipped.
fn read_notes(tree: &Value) -> BTreeMap<String, Vec<ItemNote>> {
    let mut notes: BTreeMap<String, Vec<ItemNote>> = BTreeMap::new();
    let Some(modes) = tree.as_object() else {
        return notes;
    };
    for by_item in modes.values().filter_map(Value::as_object) {
        for (id, list) in by_item {
            let Some(list) = list.as_array() else {
                continue;
            };
            for raw in list {
                match serde_json::from_value::<ItemNote>(raw.clone()) {
                    Ok(note) => notes.entry(id.clone()).or_default().push(note),
                    Err(e) => tracing::warn!(id, error = %e, "skipping unreadable note"),
                }
            }
        }
    }
    notes
}

/// Read and interpret a backup file.
///
/// # Errors
///
/// Returns [`SyncError::FileNotFound`], a JSON error, or a format error.
pub fn read_import(path: &Path) -> SyncResult<ImportPayload> {
    parse_import(read_json(path)?)
}

/// Importer for backup documents.
pub struct Importer<'a> {
    library: &'a mut Library,
    policy: MergePolicy,
}

impl<'a> Importer<'a> {
    /// Create an importer that merges with `policy`.
    #[must_use]
    pub fn new(library: &'a mut Library, policy: MergePolicy) -> Self {
        Self { library, policy }
    }

    /// Import a backup file.
    ///
    /// # Errors
    ///
    /// Returns read/format errors, blob errors, or store errors.
    pub async fn import_file(&mut self, path: &Path) -> Result<ImportStats> {
        let payload = read_import(path)?;
        tracing::info!(
            path = %path.display(),
            items = payload.items.len(),
            files = payload.files.len(),
            notes = payload.notes.len(),
            "importing backup"
        );
        self.import(payload).await
    }

    /// Restore payloads, merge items into the library, then attach notes.
    ///
    /// Only payloads of items the merge takes from the backup are restored:
    /// under `PreferLocal` a colliding local item keeps its own file, and a
    /// payload whose item is not in the backup is never written.
    ///
    /// # Errors
    ///
    /// Returns blob errors or store errors.
    pub async fn import(&mut self, payload: ImportPayload) -> Result<ImportStats> {
        let ImportPayload {
            mut items,
            mut files,
            notes,
        } = payload;
        let mut stats = ImportStats::default();

        let local_ids: HashSet<String> = if self.policy == MergePolicy::PreferLocal {
            self.library.items()?.into_iter().map(|i| i.id).collect()
        } else {
            HashSet::new()
        };
        let taken: HashSet<String> = items
            .iter()
            .map(|i| i.id.clone())
            .filter(|id| !local_ids.contains(id))
            .collect();

        files.retain(|id, _| {
            let keep = taken.contains(id);
            if !keep {
                tracing::debug!(id, "not restoring file for an item the merge does not take");
                stats.files_skipped += 1;
            }
            keep
        });
        for item in items.iter_mut().filter(|i| !taken.contains(&i.id)) {
            if item.file_data.take().is_some() {
                stats.files_skipped += 1;
            }
        }

        match self.library.blobs() {
            Some(blobs) => {
                for (id, data) in &files {
                    let bytes = match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
                        Ok(b) => b,
                        Err(e) => {
                            tracing::warn!(id, error = %e, "skipping undecodable file");
                            stats.files_skipped += 1;
                            continue;
                        }
                    };
                    let content_type = items
                        .iter()
                        .find(|i| &i.id == id)
                        .map_or_else(
                            || "application/octet-stream".to_string(),
                            |i| i.file_type.clone().unwrap_or_else(|| default_content_type(i).to_string()),
                        );
                    blobs.put(id, &bytes, &content_type).await?;
                    stats.files_restored += 1;
                }
                for item in &mut items {
                    if stash_inline_file(blobs, item).await? {
                        stats.files_restored += 1;
                    }
                }
            }
            None => {
                let mut skipped = files.len();
                for item in &mut items {
                    if item.file_data.take().is_some() {
                        skipped += 1;
                    }
                }
                if skipped > 0 {
                    tracing::warn!(
                        count = skipped,
                        "no blob store configured; file payloads not restored"
                    );
                }
                stats.files_skipped += skipped;
            }
        }

        let (merged, merge_stats) = self.library.merge(items, self.policy).await?;
        stats.items = merge_stats;
        stats.total = merged.len();
        stats.notes_restored = self.library.restore_notes(&notes).await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlobStore, BoxedBlobStore, FsBlobStore, MemoryStore};
    use crate::sync::export::Exporter;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_bare_array() {
        let payload = parse_import(json!([{"id": "a", "title": "A"}])).unwrap();
        assert_eq!(payload.items.len(), 1);
        assert!(payload.files.is_empty());
    }

    #[test]
    fn test_parse_wrapped_document() {
        let payload = parse_import(json!({
            "version": 2,
            "exportedAt": "2025-01-01T00:00:00Z",
            "items": [{"id": "a"}, {"id": "b"}],
            "files": {"a": "UE5H"}
        }))
        .unwrap();
        assert_eq!(payload.items.len(), 2);
        assert_eq!(payload.files.get("a").map(String::as_str), Some("UE5H"));
    }

    #[test]
    fn test_rejects_other_shapes() {
        for value in [json!({"notes": []}), json!("text"), json!(42), json!({"items": {}})] {
            let err = parse_import(value).unwrap_err();
            assert!(matches!(err, SyncError::InvalidFormat(_)));
        }
    }

    #[tokio::test]
    async fn test_import_prefers_incoming() {
        let mut local = Item::new("https://example.com", "local title");
        local.id = "a".into();
        let mut lib = Library::new(Box::new(MemoryStore::with_items(vec![local])));

        let payload = parse_import(json!([
            {"id": "a", "title": "imported title", "createdAt": 1},
            {"id": "b", "title": "new", "createdAt": 2}
        ]))
        .unwrap();
        let stats = Importer::new(&mut lib, MergePolicy::PreferIncoming)
            .import(payload)
            .await
            .unwrap();

        assert_eq!(stats.items.created, 1);
        assert_eq!(stats.items.updated, 1);
        assert_eq!(stats.total, 2);
        assert_eq!(lib.get("a").unwrap().title, "imported title");
    }

    #[tokio::test]
    async fn test_export_then_import_round_trip_with_files() {
        let src_blobs = TempDir::new().unwrap();
        let dst_blobs = TempDir::new().unwrap();
        let backup = TempDir::new().unwrap();
        let path = backup.path().join("backup.json");

        let mut book = Item::new("", "Book");
        book.id = "book1".into();
        book.has_epub_file = Some(true);
        book.pinned = true;
        let link = Item::new("https://example.com", "Link");
        let fs_src = FsBlobStore::new(src_blobs.path());
        fs_src.put("book1", b"EPUBDATA", "application/epub+zip").await.unwrap();

        let source = Library::new(Box::new(MemoryStore::with_items(vec![book, link])))
            .with_blobs(BoxedBlobStore::new(fs_src));
        Exporter::new(&source, true).export_to(&path).await.unwrap();

        let fs_dst = FsBlobStore::new(dst_blobs.path());
        let mut target = Library::new(Box::new(MemoryStore::new()))
            .with_blobs(BoxedBlobStore::new(fs_dst.clone()));
        let stats = Importer::new(&mut target, MergePolicy::PreferIncoming)
            .import_file(&path)
            .await
            .unwrap();

        assert_eq!(stats.files_restored, 1);
        assert_eq!(target.sorted().unwrap(), source.sorted().unwrap());
        assert_eq!(
            fs_dst.get("book1").await.unwrap().as_deref(),
            Some(&b"EPUBDATA"[..])
        );
    }

    #[tokio::test]
    async fn test_inline_file_data_is_moved_to_blobs() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path());
        let mut lib =
            Library::new(Box::new(MemoryStore::new())).with_blobs(BoxedBlobStore::new(blobs.clone()));

        let payload = parse_import(json!([
            {"id": "x", "platform": "Audio", "fileName": "a.mp3", "fileData": "SUQz"}
        ]))
        .unwrap();
        let stats = Importer::new(&mut lib, MergePolicy::PreferIncoming)
            .import(payload)
            .await
            .unwrap();

        assert_eq!(stats.files_restored, 1);
        let item = lib.get("x").unwrap();
        assert_eq!(item.has_audio_file, Some(true));
        assert!(item.file_data.is_none());
        assert_eq!(blobs.get("x").await.unwrap().as_deref(), Some(&b"ID3"[..]));
    }

    #[test]
    fn test_parse_legacy_flow_data() {
        let payload = parse_import(json!({
            "flowData": {
                "contents": {
                    "video": [
                        {"id": "v1", "url": "https://youtu.be/dQw4w9WgXcQ", "title": "Song", "createdAt": 10},
                        {"id": "v2", "url": "https://vimeo.com/1"}
                    ],
                    "book": [
                        {"id": "b1", "title": "Rust", "author": "Steve", "hasEpubFile": true,
                         "fileName": "rust.epub", "fileSize": 1024, "createdAt": 20}
                    ],
                    "paper": [{"id": "p1", "url": "https://arxiv.org/abs/1", "title": "arXiv 论文"}],
                    "audio": [{"title": "no id"}]
                },
                "notes": {"book": {"b1": [{"id": "n1", "title": "ch1", "content": "# one"}]}}
            }
        }))
        .unwrap();

        let ids: Vec<_> = payload.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["v1", "v2", "b1", "p1"]);

        let song = &payload.items[0];
        assert_eq!(song.platform, "YouTube");
        assert_eq!(song.category, "read_later");
        assert_eq!(song.created_at, 10);
        assert!(!song.pinned);

        let untitled = &payload.items[1];
        assert_eq!(untitled.title, "未命名");
        assert_eq!(untitled.platform, "Video");
        assert!(untitled.created_at > 0);

        let book = &payload.items[2];
        assert_eq!(book.platform, "Book");
        assert_eq!(book.author.as_deref(), Some("Steve"));
        assert_eq!(book.has_epub_file, Some(true));
        assert_eq!(book.file_name.as_deref(), Some("rust.epub"));
        assert_eq!(book.file_size, Some(1024));
        assert_eq!(book.url, "");

        assert_eq!(payload.items[3].platform, "Paper");
        assert_eq!(payload.notes["b1"][0].title, "ch1");
    }

    #[test]
    fn test_top_level_notes_win_over_flow_data_notes() {
        let payload = parse_import(json!({
            "items": [{"id": "a"}],
            "flowData": {"notes": {"web": {"a": [{"id": "old"}]}}},
            "notes": {"web": {"a": [{"id": "new", "title": "t"}, {"title": "no id"}]}}
        }))
        .unwrap();
        let ids: Vec<_> = payload.notes["a"].iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["new"]);
    }

    #[tokio::test]
    async fn test_import_restores_notes_without_duplicates() {
        let mut local = Item::new("https://example.com", "local");
        local.id = "a".into();
        let mut lib = Library::new(Box::new(MemoryStore::with_items(vec![local])));

        let doc = json!({
            "items": [{"id": "b", "title": "incoming"}],
            "notes": {
                "web": {
                    "a": [{"id": "n1", "title": "for local", "content": "x"}],
                    "b": [{"id": "n2", "title": "for incoming", "content": "y"}],
                    "ghost": [{"id": "n3"}]
                }
            }
        });

        let stats = Importer::new(&mut lib, MergePolicy::PreferIncoming)
            .import(parse_import(doc.clone()).unwrap())
            .await
            .unwrap();
        assert_eq!(stats.notes_restored, 2);
        assert_eq!(lib.notes("a").unwrap()[0].title, "for local");
        assert_eq!(lib.notes("b").unwrap()[0].id, "n2");

        let stats = Importer::new(&mut lib, MergePolicy::PreferIncoming)
            .import(parse_import(doc).unwrap())
            .await
            .unwrap();
        // "b" was replaced by the backup copy, which carries no notes of its own.
        assert_eq!(stats.notes_restored, 1);
        assert_eq!(lib.notes("a").unwrap().len(), 1);
        assert_eq!(lib.notes("b").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prefer_local_keeps_local_payload() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path());
        blobs.put("book1", b"LOCAL", "application/epub+zip").await.unwrap();

        let mut local = Item::new("", "Local book");
        local.id = "book1".into();
        local.has_epub_file = Some(true);
        let mut lib = Library::new(Box::new(MemoryStore::with_items(vec![local])))
            .with_blobs(BoxedBlobStore::new(blobs.clone()));

        let payload = parse_import(json!({
            "items": [
                {"id": "book1", "title": "Backup book", "hasEpubFile": true},
                {"id": "book2", "title": "New book", "hasEpubFile": true, "fileData": "SUQz"}
            ],
            "files": {"book1": "UkVNT1RF"}
        }))
        .unwrap();
        let stats = Importer::new(&mut lib, MergePolicy::PreferLocal)
            .import(payload)
            .await
            .unwrap();

        assert_eq!(stats.files_restored, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(blobs.get("book1").await.unwrap().as_deref(), Some(&b"LOCAL"[..]));
        assert_eq!(blobs.get("book2").await.unwrap().as_deref(), Some(&b"ID3"[..]));
        assert_eq!(lib.get("book1").unwrap().title, "Local book");
    }

    #[tokio::test]
    async fn test_replace_skips_files_without_items() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path());
        let mut lib =
            Library::new(Box::new(MemoryStore::new())).with_blobs(BoxedBlobStore::new(blobs.clone()));

        let payload = parse_import(json!({
            "items": [{"id": "kept", "hasEpubFile": true}],
            "files": {"kept": "UE5H", "orphan": "UE5H"}
        }))
        .unwrap();
        let stats = Importer::new(&mut lib, MergePolicy::Replace)
            .import(payload)
            .await
            .unwrap();

        assert_eq!(stats.files_restored, 1);
        assert_eq!(stats.files_skipped, 1);
        assert!(blobs.get("kept").await.unwrap().is_some());
        assert!(blobs.get("orphan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inline_data_without_blob_store_is_counted_not_fatal() {
        let mut lib = Library::new(Box::new(MemoryStore::new()));
        let payload = parse_import(json!([
            {"id": "x", "platform": "Audio", "fileData": "SUQz"}
        ]))
        .unwrap();
        let stats = Importer::new(&mut lib, MergePolicy::PreferIncoming)
            .import(payload)
            .await
            .unwrap();

        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.total, 1);
    }
}
