//! Markdown notes attached to an item.
//!
//! A note is a Markdown document (usually dropped in as a `.md` file) kept on
//! the item it annotates, so it moves with the item through every store,
//! sync push and backup. Deleting the item deletes its notes.

use serde::{Deserialize, Serialize};

use super::item::{generate_id, now_millis};

/// Characters of content shown in a preview.
const PREVIEW_CHARS: usize = 80;

/// File extensions accepted as notes.
const NOTE_EXTENSIONS: [&str; 2] = [".md", ".markdown"];

/// One Markdown note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemNote {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,

    /// Plain-text excerpt for list views
    #[serde(default)]
    pub preview: String,

    /// Unix milliseconds
    #[serde(default)]
    pub created_at: i64,
}

impl ItemNote {
    /// Create a note with a fresh id and its preview computed from `content`.
    #[must_use]
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            id: generate_id(),
            title: title.to_string(),
            content: content.to_string(),
            preview: note_preview(content),
            created_at: now_millis(),
        }
    }
}

/// First 80 characters of `content` with Markdown markers (`#`, `*`, backticks)
/// and newlines blanked, trimmed.
#[must_use]
pub fn note_preview(content: &str) -> String {
    content
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if matches!(c, '#' | '*' | '`' | '\n') { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Note title for a Markdown file name: the name without `.md` / `.markdown`.
///
/// Returns `None` for any other file.
#[must_use]
pub fn note_title(file_name: &str) -> Option<String> {
    NOTE_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .map(str::to_string)
}
