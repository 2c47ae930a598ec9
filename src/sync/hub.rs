//! Host-side sync hub.
//!
//! The hub owns the host's [`Library`] and a broadcast channel. REST
//! handlers and WebSocket connections both call into it, so a mutation from
//! any surface reaches every connected client as a full `items-updated`
//! array. A receiver that falls behind simply misses pushes until the next
//! one; there is no replay.

use tokio::sync::{broadcast, Mutex};

use crate::error::Result;
use crate::library::Library;
use crate::metadata::{Metadata, MetadataFetcher};
use crate::model::Item;
use crate::sync::protocol::Message;

/// Pending pushes per receiver before it starts lagging.
const BROADCAST_CAPACITY: usize = 64;

/// Shared host state.
pub struct SyncHub {
    library: Mutex<Library>,
    fetcher: MetadataFetcher,
    updates: broadcast::Sender<Message>,
}

impl std::fmt::Debug for SyncHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHub")
            .field("subscribers", &self.updates.receiver_count())
            .finish_non_exhaustive()
    }
}

impl SyncHub {
    #[must_use]
    pub fn new(library: Library, fetcher: MetadataFetcher) -> Self {
        let (updates, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            library: Mutex::new(library),
            fetcher,
            updates,
        }
    }

    /// Receive every `items-updated` push from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.updates.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.updates.receiver_count()
    }

    fn broadcast(&self, items: &[Item]) {
        let receivers = self
            .updates
            .send(Message::ItemsUpdated {
                items: items.to_vec(),
            })
            .unwrap_or(0);
        tracing::debug!(items = items.len(), receivers, "broadcast items-updated");
    }

    /// Full array in stored order.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn items(&self) -> Result<Vec<Item>> {
        self.library.lock().await.items()
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn save_item(&self, item: Item) -> Result<Vec<Item>> {
        let items = self.library.lock().await.add(item).await?;
        self.broadcast(&items);
        Ok(items)
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn delete_item(&self, id: &str) -> Result<Vec<Item>> {
        let items = self.library.lock().await.delete(id).await?;
        self.broadcast(&items);
        Ok(items)
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn update_items(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        let items = self.library.lock().await.update_items(items).await?;
        self.broadcast(&items);
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns [`crate::error::Error::ItemNotFound`] for unknown ids.
    pub async fn update_item(&self, item: Item) -> Result<Vec<Item>> {
        let items = self.library.lock().await.update_item(item).await?;
        self.broadcast(&items);
        Ok(items)
    }

    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn toggle_pin(&self, id: &str) -> Result<Vec<Item>> {
        let items = self.library.lock().await.toggle_pin(id).await?;
        self.broadcast(&items);
        Ok(items)
    }

    /// Scrape a URL through the host. Never fails.
    pub async fn fetch_metadata(&self, url: &str) -> Metadata {
        self.fetcher.fetch(url).await
    }

    /// Apply one incoming message and return the direct reply, if any.
    ///
    /// Mutations reply through the broadcast channel only; failures are
    /// answered with an `error` message.
    pub async fn handle(&self, message: Message) -> Option<Message> {
        tracing::debug!(kind = message.kind(), "handling sync message");

        let applied = match message {
            Message::GetItems => {
                return Some(match self.items().await {
                    Ok(items) => Message::ItemsUpdated { items },
                    Err(e) => Message::error(e.to_string()),
                });
            }
            Message::SaveItem { item } => self.save_item(item).await,
            Message::DeleteItem { id } => self.delete_item(&id).await,
            Message::UpdateItems { items } => self.update_items(items).await,
            Message::UpdateItem { item } => self.update_item(item).await,
            Message::TogglePin { id } => self.toggle_pin(&id).await,
            Message::FetchMetadata { url } => {
                let meta = self.fetch_metadata(&url).await;
                return Some(Message::metadata(&url, meta));
            }
            Message::Ping => return Some(Message::Pong),
            Message::Pong => return None,
            other @ (Message::Metadata { .. }
            | Message::ItemsUpdated { .. }
            | Message::Error { .. }) => {
                tracing::warn!(kind = other.kind(), "client sent a host-only message");
                return Some(Message::error(format!(
                    "unexpected message type: {}",
                    other.kind()
                )));
            }
        };

        match applied {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "sync mutation failed");
                Some(Message::error(e.to_string()))
            }
        }
    }

    /// Parse and apply a raw text frame.
    pub async fn handle_text(&self, text: &str) -> Option<Message> {
        match Message::parse(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed sync message");
                Some(Message::error(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        BlobStore, BoxedBlobStore, FsBlobStore, ItemStore, JsonFileStore, MemoryStore,
    };
    use tempfile::TempDir;

    fn hub() -> SyncHub {
        SyncHub::new(
            Library::new(Box::new(MemoryStore::new())),
            MetadataFetcher::default(),
        )
    }

    fn item(id: &str) -> Item {
        let mut item = Item::new("https://example.com", id);
        item.id = id.to_string();
        item
    }

    #[tokio::test]
    async fn test_mutation_broadcasts_full_array() {
        let hub = hub();
        let mut rx = hub.subscribe();

        let reply = hub.handle(Message::SaveItem { item: item("a") }).await;
        assert!(reply.is_none());
        match rx.recv().await.unwrap() {
            Message::ItemsUpdated { items } => assert_eq!(items.len(), 1),
            other => panic!("unexpected {other:?}"),
        }

        hub.handle(Message::SaveItem { item: item("b") }).await;
        hub.handle(Message::TogglePin { id: "a".into() }).await;
        let _ = rx.recv().await.unwrap();
        match rx.recv().await.unwrap() {
            Message::ItemsUpdated { items } => {
                assert_eq!(items[0].id, "a");
                assert!(items[0].pinned);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_items_and_ping_reply_directly() {
        let hub = hub();
        hub.save_item(item("a")).await.unwrap();

        match hub.handle(Message::GetItems).await {
            Some(Message::ItemsUpdated { items }) => assert_eq!(items.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(hub.handle(Message::Ping).await, Some(Message::Pong));
        assert_eq!(hub.handle(Message::Pong).await, None);
    }

    #[tokio::test]
    async fn test_failures_answer_with_error() {
        let hub = hub();
        let reply = hub.handle(Message::UpdateItem { item: item("ghost") }).await;
        assert!(matches!(reply, Some(Message::Error { .. })));

        let reply = hub.handle_text("{\"type\":\"nope\"}").await;
        assert!(matches!(reply, Some(Message::Error { .. })));

        let reply = hub.handle(Message::ItemsUpdated { items: vec![] }).await;
        assert!(matches!(reply, Some(Message::Error { .. })));
    }

    #[tokio::test]
    async fn test_fetch_metadata_replies_to_requester() {
        let hub = hub();
        let reply = hub
            .handle(Message::FetchMetadata {
                url: "not-a-url".into(),
            })
            .await;
        assert_eq!(
            reply,
            Some(Message::Metadata {
                url: "not-a-url".into(),
                title: String::new(),
                image: String::new(),
            })
        );
    }

    #[tokio::test]
    async fn test_inline_payloads_reach_blob_store() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("config.json");
        std::fs::write(
            &doc,
            r#"{"items":[{"id":"book1","platform":"Book","hasEpubFile":true,"fileData":"UE5H"}]}"#,
        )
        .unwrap();
        let blobs = FsBlobStore::new(&dir.path().join("files"));
        let hub = SyncHub::new(
            Library::new(Box::new(JsonFileStore::new(&doc)))
                .with_blobs(BoxedBlobStore::new(blobs.clone())),
            MetadataFetcher::default(),
        );

        let mut incoming: Item = serde_json::from_str(
            r#"{"id":"book2","platform":"Book","hasEpubFile":true,"fileData":"SUQz"}"#,
        )
        .unwrap();
        incoming.title = "second".into();
        assert!(hub.handle(Message::SaveItem { item: incoming }).await.is_none());

        assert_eq!(blobs.get("book1").await.unwrap().as_deref(), Some(&b"PNG"[..]));
        assert_eq!(blobs.get("book2").await.unwrap().as_deref(), Some(&b"ID3"[..]));

        let stored = JsonFileStore::new(&doc).load().unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|i| i.file_data.is_none() && i.has_file()));
        let raw = std::fs::read_to_string(&doc).unwrap();
        assert!(!raw.contains("fileData"));
    }

    #[tokio::test]
    async fn test_inline_payload_without_blob_store_is_refused() {
        let hub = hub();
        let mut incoming = item("book");
        incoming.file_data = Some("UE5H".into());

        let reply = hub.handle(Message::SaveItem { item: incoming }).await;
        assert!(matches!(reply, Some(Message::Error { .. })));
        assert!(hub.items().await.unwrap().is_empty());
    }
}
