//! Sync message envelope.
//!
//! Every frame is a flat JSON object with a `type` discriminator and the
//! payload fields beside it, e.g. `{"type":"toggle-pin","id":"lq3k2"}`.
//! There are no sequence numbers, acknowledgments or deltas: mutations are
//! fire-and-forget and the host answers with a full `items-updated` array.

use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;
use crate::model::Item;
use crate::sync::types::{SyncError, SyncResult};

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    /// Ask the host for the full array.
    GetItems,
    /// Prepend an item.
    SaveItem { item: Item },
    /// Remove an item by id.
    DeleteItem { id: String },
    /// Overwrite the whole array.
    UpdateItems { items: Vec<Item> },
    /// Replace one item by id.
    UpdateItem { item: Item },
    /// Flip an item's pin.
    TogglePin { id: String },
    /// Ask the host to scrape a URL.
    FetchMetadata { url: String },
    /// Reply to `fetch-metadata`.
    Metadata {
        url: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        image: String,
    },
    Ping,
    Pong,
    /// Host push: the complete array after a change.
    ItemsUpdated { items: Vec<Item> },
    /// Host reply to a message it could not apply.
    Error { message: String },
}

impl Message {
    /// Parse one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidMessage`] for malformed JSON or unknown types.
    pub fn parse(text: &str) -> SyncResult<Self> {
        serde_json::from_str(text).map_err(|e| SyncError::InvalidMessage(e.to_string()))
    }

    /// Serialize to a text frame.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if an item holds unserializable extra data.
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::GetItems => "get-items",
            Self::SaveItem { .. } => "save-item",
            Self::DeleteItem { .. } => "delete-item",
            Self::UpdateItems { .. } => "update-items",
            Self::UpdateItem { .. } => "update-item",
            Self::TogglePin { .. } => "toggle-pin",
            Self::FetchMetadata { .. } => "fetch-metadata",
            Self::Metadata { .. } => "metadata",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::ItemsUpdated { .. } => "items-updated",
            Self::Error { .. } => "error",
        }
    }

    /// Whether the host must broadcast the array after applying this message.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::SaveItem { .. }
                | Self::DeleteItem { .. }
                | Self::UpdateItems { .. }
                | Self::UpdateItem { .. }
                | Self::TogglePin { .. }
        )
    }

    /// Build a `metadata` reply.
    #[must_use]
    pub fn metadata(url: &str, meta: Metadata) -> Self {
        Self::Metadata {
            url: url.to_string(),
            title: meta.title,
            image: meta.image,
        }
    }

    /// Build an `error` reply.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape_is_flat() {
        let msg = Message::TogglePin { id: "abc".into() };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "toggle-pin", "id": "abc"}));

        let value: serde_json::Value =
            serde_json::from_str(&Message::GetItems.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "get-items"}));
    }

    #[test]
    fn test_parse_items_updated_with_legacy_items() {
        let msg = Message::parse(
            r#"{"type":"items-updated","items":[{"id":"a","createdAt":"2024-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        match msg {
            Message::ItemsUpdated { items } => {
                assert_eq!(items[0].created_at, 1_704_067_200_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(Message::parse(r#"{"type":"launch-rockets"}"#).is_err());
        assert!(Message::parse("not json").is_err());
    }

    #[test]
    fn test_kind_matches_tag() {
        let msg = Message::metadata("https://a", Metadata::default());
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], msg.kind());
        assert!(Message::DeleteItem { id: "x".into() }.is_mutation());
        assert!(!Message::Ping.is_mutation());
    }
}
