//! The item library.
//!
//! [`Library`] owns the item store and the optional blob store and is the
//! only way items change: captures, pins, notes, drag-reorders, sync pushes
//! and imports all go through it. Views (display order, platform filter,
//! mode groups) are derived from the stored array on every read.

use std::collections::{BTreeMap, HashSet};

use base64::Engine;

use crate::capture::{self, EPUB_CONTENT_TYPE};
use crate::epub::parse_epub;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::model::{note_title, sort_for_display, Item, ItemNote, Mode};
use crate::storage::{BoxedBlobStore, ItemStore};
use crate::sync::{resolve, MergePolicy, MergeStats};

/// A capture request for a link.
#[derive(Debug, Clone, Default)]
pub struct LinkCapture {
    pub url: String,
    pub category: Option<String>,
    pub note: Option<String>,
    /// Capture into a specific mode; otherwise the platform is detected from the URL.
    pub mode: Option<Mode>,
}

/// Item list plus blob storage, behind one mutation API.
pub struct Library {
    store: Box<dyn ItemStore>,
    blobs: Option<BoxedBlobStore>,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("store", &self.store.describe())
            .field("blobs", &self.blobs)
            .finish()
    }
}

impl Library {
    #[must_use]
    pub fn new(store: Box<dyn ItemStore>) -> Self {
        Self { store, blobs: None }
    }

    /// Attach a blob store for EPUB and audio payloads.
    #[must_use]
    pub fn with_blobs(mut self, blobs: BoxedBlobStore) -> Self {
        self.blobs = Some(blobs);
        self
    }

    #[must_use]
    pub fn blobs(&self) -> Option<&BoxedBlobStore> {
        self.blobs.as_ref()
    }

    #[must_use]
    pub fn describe(&self) -> String {
        self.store.describe()
    }

    fn require_blobs(&self) -> Result<&BoxedBlobStore> {
        self.blobs
            .as_ref()
            .ok_or_else(|| Error::Config("no blob store configured for file payloads".to_string()))
    }

    // ── Reads ─────────────────────────────────────────────────

    /// Items in stored order.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn items(&self) -> Result<Vec<Item>> {
        self.store.get_items()
    }

    /// Items in display order (pinned first, newest first).
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn sorted(&self) -> Result<Vec<Item>> {
        let mut items = self.items()?;
        sort_for_display(&mut items);
        Ok(items)
    }

    /// Display-ordered items whose platform matches case-insensitively.
    /// `all` disables the filter.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn filter_platform(&self, platform: &str) -> Result<Vec<Item>> {
        let items = self.sorted()?;
        if platform.eq_ignore_ascii_case("all") {
            return Ok(items);
        }
        Ok(items
            .into_iter()
            .filter(|i| i.platform.eq_ignore_ascii_case(platform))
            .collect())
    }

    /// Display-ordered items belonging to `mode`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn by_mode(&self, mode: Mode) -> Result<Vec<Item>> {
        Ok(self
            .sorted()?
            .into_iter()
            .filter(|i| Mode::from_platform(&i.platform) == mode)
            .collect())
    }

    /// Look up one item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemNotFound`] if no item has `id`.
    pub fn get(&self, id: &str) -> Result<Item> {
        self.items()?
            .into_iter()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::ItemNotFound { id: id.to_string() })
    }

    // ── Captures ──────────────────────────────────────────────

    /// Prepend a captured item.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn add(&mut self, mut item: Item) -> Result<Vec<Item>> {
        self.settle_inline_files(std::slice::from_mut(&mut item)).await?;
        tracing::info!(id = %item.id, platform = %item.platform, "saving item");
        self.store.save_item(item)
    }

    /// Build and save a link item. The title falls back through
    /// [`capture::fallback_title`] when metadata has none.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn add_url(&mut self, capture: &LinkCapture, metadata: &Metadata) -> Result<Item> {
        let url = capture.url.trim();
        let title = capture::fallback_title(url, &metadata.title, capture.mode);
        let mut item = Item::new(url, &title);
        item.image.clone_from(&metadata.image);
        if let Some(category) = capture.category.as_deref().filter(|c| !c.is_empty()) {
            item.category = category.to_string();
        }
        if let Some(note) = &capture.note {
            item.note.clone_from(note);
        }
        if let Some(mode) = capture.mode {
            item.platform = mode.platform_for(url).to_string();
        }
        self.add(item.clone()).await?;
        Ok(item)
    }

    /// Parse an EPUB, store its bytes, then save a `Book` item.
    ///
    /// The blob is written first; if that fails nothing is saved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Epub`] for unreadable books, [`Error::Config`] when no
    /// blob store is attached, or the blob/store error.
    pub async fn add_epub(&mut self, file_name: &str, bytes: &[u8]) -> Result<Item> {
        let info = parse_epub(bytes, file_name)?;

        let mut item = Item::new("", &info.title);
        item.platform = Mode::Book.platform_for("").to_string();
        item.author = Some(info.author);
        item.image = info.cover.unwrap_or_default();
        item.has_epub_file = Some(true);
        item.file_name = Some(file_name.to_string());
        item.file_size = Some(bytes.len() as u64);
        item.file_type = Some(EPUB_CONTENT_TYPE.to_string());

        let location = self
            .require_blobs()?
            .put(&item.id, bytes, EPUB_CONTENT_TYPE)
            .await?;
        item.file_url = location.url;

        self.add(item.clone()).await?;
        Ok(item)
    }

    /// Store an audio file and save an `Audio` item titled by the file stem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for non-audio content types,
    /// [`Error::Config`] when no blob store is attached, or the blob/store error.
    pub async fn add_audio(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<Item> {
        let content_type = content_type
            .map(str::to_string)
            .or_else(|| capture::audio_content_type(file_name).map(str::to_string))
            .filter(|ct| capture::is_audio_content_type(ct))
            .ok_or_else(|| {
                Error::InvalidArgument(format!("{file_name} is not an audio file"))
            })?;

        let mut item = Item::new("", &capture::file_stem(file_name));
        item.platform = Mode::Audio.platform_for("").to_string();
        item.has_audio_file = Some(true);
        item.file_name = Some(file_name.to_string());
        item.file_size = Some(bytes.len() as u64);
        item.file_type = Some(content_type.clone());

        let location = self
            .require_blobs()?
            .put(&item.id, bytes, &content_type)
            .await?;
        item.file_url = location.url;

        self.add(item.clone()).await?;
        Ok(item)
    }

    // ── Mutations ─────────────────────────────────────────────

    /// Remove an item, then best-effort remove its payload.
    ///
    /// # Errors
    ///
    /// Propagates store errors. Blob failures are logged only.
    pub async fn delete(&mut self, id: &str) -> Result<Vec<Item>> {
        self.settle_inline_files(&mut []).await?;
        let had_file = self
            .items()?
            .iter()
            .any(|i| i.id == id && i.has_file());
        let items = self.store.delete_item(id)?;

        if had_file {
            if let Some(blobs) = &self.blobs {
                if let Err(e) = blobs.delete(id).await {
                    tracing::warn!(id, error = %e, "failed to delete stored file");
                }
            }
        }
        Ok(items)
    }

    /// Flip `pinned` on an item. Unknown ids leave the array unchanged.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn toggle_pin(&mut self, id: &str) -> Result<Vec<Item>> {
        self.settle_inline_files(&mut []).await?;
        self.store.toggle_pin(id)
    }

    /// Replace an item's note.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemNotFound`] if no item has `id`.
    pub async fn set_note(&mut self, id: &str, note: &str) -> Result<Vec<Item>> {
        self.settle_inline_files(&mut []).await?;
        let mut item = self.get(id)?;
        item.note = note.to_string();
        self.store.update_item(item)
    }

    /// Markdown notes attached to an item, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemNotFound`] if no item has `id`.
    pub fn notes(&self, id: &str) -> Result<Vec<ItemNote>> {
        Ok(self.get(id)?.notes)
    }

    /// Attach a Markdown note to an item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemNotFound`] if no item has `id`.
    pub async fn attach_note(
        &mut self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<ItemNote> {
        self.settle_inline_files(&mut []).await?;
        let mut item = self.get(id)?;
        let note = ItemNote::new(title, content);
        item.notes.push(note.clone());
        self.store.update_item(item)?;
        tracing::info!(id, note = %note.id, "attached note");
        Ok(note)
    }

    /// Attach a `.md` / `.markdown` file, titled by its name without the extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for other file types and
    /// [`Error::ItemNotFound`] for unknown items.
    pub async fn attach_note_file(
        &mut self,
        id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<ItemNote> {
        let title = note_title(file_name).ok_or_else(|| {
            Error::InvalidArgument(format!("{file_name} is not a Markdown file (.md, .markdown)"))
        })?;
        self.attach_note(id, &title, content).await
    }

    /// Remove one note from an item. Returns whether the note existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemNotFound`] if no item has `id`.
    pub async fn delete_note(&mut self, id: &str, note_id: &str) -> Result<bool> {
        self.settle_inline_files(&mut []).await?;
        let mut item = self.get(id)?;
        let before = item.notes.len();
        item.notes.retain(|n| n.id != note_id);
        if item.notes.len() == before {
            return Ok(false);
        }
        self.store.update_item(item)?;
        Ok(true)
    }

    /// Add notes keyed by item id to the stored items, skipping note ids the
    /// item already has and ids with no stored item. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn restore_notes(
        &mut self,
        notes: &BTreeMap<String, Vec<ItemNote>>,
    ) -> Result<usize> {
        if notes.is_empty() {
            return Ok(0);
        }
        self.settle_inline_files(&mut []).await?;

        let mut items = self.items()?;
        let mut added = 0;
        for item in &mut items {
            let Some(incoming) = notes.get(&item.id) else {
                continue;
            };
            for note in incoming {
                if !item.notes.iter().any(|n| n.id == note.id) {
                    item.notes.push(note.clone());
                    added += 1;
                }
            }
        }
        if added > 0 {
            self.store.update_items(items)?;
        }
        Ok(added)
    }

    /// Replace the stored item with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemNotFound`] if no item has that id.
    pub async fn update_item(&mut self, mut item: Item) -> Result<Vec<Item>> {
        self.settle_inline_files(std::slice::from_mut(&mut item)).await?;
        self.store.update_item(item)
    }

    /// Overwrite the whole array.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn update_items(&mut self, mut items: Vec<Item>) -> Result<Vec<Item>> {
        self.settle_inline_files(&mut items).await?;
        self.store.update_items(items)
    }

    /// Rewrite the stored order. `ids` must name every stored item exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `ids` is not a permutation of
    /// the stored ids.
    pub async fn reorder(&mut self, ids: &[String]) -> Result<Vec<Item>> {
        self.settle_inline_files(&mut []).await?;
        let items = self.items()?;
        let stored: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();

        if ids.len() != items.len() || requested.len() != ids.len() || requested != stored {
            return Err(Error::InvalidArgument(format!(
                "reorder needs each of the {} stored ids exactly once (got {})",
                items.len(),
                ids.len()
            )));
        }

        let mut remaining = items;
        let mut ordered = Vec::with_capacity(remaining.len());
        for id in ids {
            if let Some(pos) = remaining.iter().position(|i| &i.id == id) {
                ordered.push(remaining.swap_remove(pos));
            }
        }
        self.store.update_items(ordered)
    }

    /// Move one item to `to_index` in stored order (clamped to the end).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemNotFound`] if no item has `id`.
    pub async fn move_item(&mut self, id: &str, to_index: usize) -> Result<Vec<Item>> {
        let mut ids: Vec<String> = self.items()?.into_iter().map(|i| i.id).collect();
        let from = ids
            .iter()
            .position(|i| i == id)
            .ok_or_else(|| Error::ItemNotFound { id: id.to_string() })?;
        let moved = ids.remove(from);
        ids.insert(to_index.min(ids.len()), moved);
        self.reorder(&ids).await
    }

    // ── Sync ──────────────────────────────────────────────────

    /// Replace the local array with a host push.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn replace_all(&mut self, items: Vec<Item>) -> Result<Vec<Item>> {
        let (items, _) = self.merge(items, MergePolicy::Replace).await?;
        Ok(items)
    }

    /// Merge `incoming` into the stored array under `policy` and persist the result.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn merge(
        &mut self,
        mut incoming: Vec<Item>,
        policy: MergePolicy,
    ) -> Result<(Vec<Item>, MergeStats)> {
        self.settle_inline_files(&mut incoming).await?;
        let local = self.items()?;
        let (merged, stats) = resolve(local, incoming, policy);
        tracing::debug!(?policy, ?stats, "merged items");
        let items = self.store.update_items(merged)?;
        Ok((items, stats))
    }

    /// Move legacy inline `fileData` payloads into the blob store.
    ///
    /// Returns how many payloads were moved. Items whose payload fails to
    /// decode keep their metadata but lose the inline data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when inline payloads exist and no blob store
    /// is attached, or the blob/store error.
    pub async fn materialize_inline_files(&mut self) -> Result<usize> {
        let mut items = self.items()?;
        if !items.iter().any(|i| i.file_data.is_some()) {
            return Ok(0);
        }

        let blobs = self.require_blobs()?;
        let mut moved = 0;
        for item in &mut items {
            if stash_inline_file(blobs, item).await? {
                moved += 1;
            }
        }

        self.store.update_items(items)?;
        tracing::info!(moved, "moved inline files to blob store");
        Ok(moved)
    }

    /// Run before every store write. Stored items still carrying inline
    /// payloads would lose them on the next whole-array write, and incoming
    /// items may carry one from a legacy client, so both are moved to the
    /// blob store first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a payload is pending and no blob store
    /// is attached, or the blob/store error.
    async fn settle_inline_files(&mut self, incoming: &mut [Item]) -> Result<()> {
        self.materialize_inline_files().await?;
        if !incoming.iter().any(|i| i.file_data.is_some()) {
            return Ok(());
        }
        let blobs = self.require_blobs()?;
        for item in incoming {
            stash_inline_file(blobs, item).await?;
        }
        Ok(())
    }
}

/// Move one item's legacy inline payload into `blobs`.
///
/// Returns whether a payload was stored. An undecodable payload is dropped
/// with a warning and the item keeps its metadata.
///
/// # Errors
///
/// Returns the blob store's error.
pub(crate) async fn stash_inline_file(blobs: &BoxedBlobStore, item: &mut Item) -> Result<bool> {
    let Some(data) = item.file_data.take() else {
        return Ok(false);
    };
    let bytes = match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(id = %item.id, error = %e, "dropping undecodable inline file");
            return Ok(false);
        }
    };
    let content_type = item
        .file_type
        .clone()
        .unwrap_or_else(|| default_content_type(item).to_string());
    let location = blobs.put(&item.id, &bytes, &content_type).await?;

    if item.has_epub_file.is_none() && item.has_audio_file.is_none() {
        if Mode::from_platform(&item.platform) == Mode::Audio {
            item.has_audio_file = Some(true);
        } else {
            item.has_epub_file = Some(true);
        }
    }
    if item.file_size.is_none() {
        item.file_size = Some(location.size);
    }
    if location.url.is_some() {
        item.file_url = location.url;
    }
    Ok(true)
}

pub(crate) fn default_content_type(item: &Item) -> &'static str {
    if item.has_audio_file.unwrap_or(false) || Mode::from_platform(&item.platform) == Mode::Audio {
        item.file_name
            .as_deref()
            .and_then(capture::audio_content_type)
            .unwrap_or("audio/mpeg")
    } else {
        EPUB_CONTENT_TYPE
    }
}
