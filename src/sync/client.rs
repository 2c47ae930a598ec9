//! Sync client.
//!
//! A client keeps working on its own [`Library`] and mirrors the host when
//! one is reachable. It tries to connect exactly once; if that fails or the
//! connection later drops, it stays local-only until a new client is made.
//! Every local operation is applied first and then forwarded, and every
//! `items-updated` push replaces the local array wholesale.

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::Result;
use crate::library::Library;
use crate::metadata::{Metadata, MetadataFetcher};
use crate::model::Item;
use crate::sync::protocol::Message;
use crate::sync::types::{SyncError, SyncResult};

/// Default time allowed for the initial connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outcome of the connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Mirroring a host.
    Connected { url: String },
    /// Working on local storage only.
    LocalOnly { reason: String },
}

/// Build the WebSocket URL for a host given as `host:port`, an http(s) URL
/// or a ws(s) URL. A missing path becomes `/ws`.
///
/// # Errors
///
/// Returns [`SyncError::Connection`] if the host cannot be parsed.
pub fn ws_url(host: &str) -> SyncResult<String> {
    let host = host.trim();
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("ws://{host}")
    };
    let mut url = url::Url::parse(&with_scheme)
        .map_err(|e| SyncError::Connection(format!("invalid host {host}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SyncError::Connection(format!(
                "unsupported scheme {other} for host {host}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| SyncError::Connection(format!("cannot use {scheme} for {host}")))?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/ws");
    }
    Ok(url.to_string())
}

/// Local-first client that mirrors a host over one WebSocket.
pub struct SyncClient {
    library: Library,
    peer_id: String,
    socket: Option<Socket>,
    state: ConnectionState,
    fetcher: MetadataFetcher,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("peer_id", &self.peer_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SyncClient {
    /// A client with no host.
    #[must_use]
    pub fn local(library: Library) -> Self {
        Self {
            library,
            peer_id: new_peer_id(),
            socket: None,
            state: ConnectionState::LocalOnly {
                reason: "no host configured".to_string(),
            },
            fetcher: MetadataFetcher::default(),
        }
    }

    /// Try once to reach `host` within `timeout`. Never fails: on any error
    /// the client comes back local-only with the reason recorded.
    pub async fn connect(library: Library, host: &str, timeout: Duration) -> Self {
        let mut client = Self::local(library);
        let url = match ws_url(host) {
            Ok(url) => url,
            Err(e) => {
                client.go_local(e.to_string());
                return client;
            }
        };

        match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str())).await {
            Ok(Ok((socket, _response))) => {
                tracing::info!(url = %url, peer = %client.peer_id, "connected to host");
                client.socket = Some(socket);
                client.state = ConnectionState::Connected { url };
            }
            Ok(Err(e)) => client.go_local(format!("cannot reach {url}: {e}")),
            Err(_) => client.go_local(format!(
                "timed out after {}s connecting to {url}",
                timeout.as_secs()
            )),
        }
        client
    }

    fn go_local(&mut self, reason: String) {
        tracing::warn!(%reason, "sync unavailable; using local storage only");
        self.socket = None;
        self.state = ConnectionState::LocalOnly { reason };
    }

    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Random identifier for this client session.
    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    #[must_use]
    pub fn library(&self) -> &Library {
        &self.library
    }

    #[must_use]
    pub fn into_library(self) -> Library {
        self.library
    }

    /// Forward a message to the host if connected. Send failures drop the
    /// connection; they never fail the local operation.
    async fn forward(&mut self, message: &Message) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        let text = match message.to_json() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "cannot encode sync message");
                return;
            }
        };
        if let Err(e) = socket.send(Frame::Text(text)).await {
            self.go_local(format!("connection lost: {e}"));
        }
    }

    // ── Local-first operations ────────────────────────────────

    /// # Errors
    ///
    /// Propagates local store errors.
    pub async fn save_item(&mut self, item: Item) -> Result<Vec<Item>> {
        let items = self.library.add(item.clone()).await?;
        self.forward(&Message::SaveItem { item }).await;
        Ok(items)
    }

    /// # Errors
    ///
    /// Propagates local store errors.
    pub async fn delete_item(&mut self, id: &str) -> Result<Vec<Item>> {
        let items = self.library.delete(id).await?;
        self.forward(&Message::DeleteItem { id: id.to_string() }).await;
        Ok(items)
    }

    /// # Errors
    ///
    /// Propagates local store errors.
    pub async fn update_items(&mut self, items: Vec<Item>) -> Result<Vec<Item>> {
        let items = self.library.update_items(items).await?;
        self.forward(&Message::UpdateItems {
            items: items.clone(),
        })
        .await;
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns [`crate::error::Error::ItemNotFound`] for unknown ids.
    pub async fn update_item(&mut self, item: Item) -> Result<Vec<Item>> {
        let items = self.library.update_item(item.clone()).await?;
        self.forward(&Message::UpdateItem { item }).await;
        Ok(items)
    }

    /// # Errors
    ///
    /// Propagates local store errors.
    pub async fn toggle_pin(&mut self, id: &str) -> Result<Vec<Item>> {
        let items = self.library.toggle_pin(id).await?;
        self.forward(&Message::TogglePin { id: id.to_string() }).await;
        Ok(items)
    }

    // ── Host round-trips ──────────────────────────────────────

    /// Wait up to `timeout` for the next protocol message.
    ///
    /// `items-updated` pushes are applied to the local library before being
    /// returned. Returns `None` on timeout, when disconnected, or when the
    /// host closes the connection.
    ///
    /// # Errors
    ///
    /// Propagates local store errors while applying a push.
    pub async fn next_message(&mut self, timeout: Duration) -> Result<Option<Message>> {
        let deadline = Instant::now() + timeout;
        loop {
            let Some(socket) = self.socket.as_mut() else {
                return Ok(None);
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let frame = match tokio::time::timeout(remaining, socket.next()).await {
                Err(_) => return Ok(None),
                Ok(None) => {
                    self.go_local("host closed the connection".to_string());
                    return Ok(None);
                }
                Ok(Some(Err(e))) => {
                    self.go_local(format!("connection lost: {e}"));
                    return Ok(None);
                }
                Ok(Some(Ok(frame))) => frame,
            };

            let text = match frame {
                Frame::Text(text) => text,
                Frame::Close(_) => {
                    self.go_local("host closed the connection".to_string());
                    return Ok(None);
                }
                _ => continue,
            };

            let message = match Message::parse(&text) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring malformed message from host");
                    continue;
                }
            };

            if let Message::ItemsUpdated { items } = &message {
                tracing::debug!(items = items.len(), "applying host push");
                self.library.replace_all(items.clone()).await?;
            }
            return Ok(Some(message));
        }
    }

    /// Apply pushes until `matches` accepts a message or `timeout` elapses.
    async fn wait_for<F>(&mut self, timeout: Duration, what: &str, matches: F) -> Result<Message>
    where
        F: Fn(&Message) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_message(remaining).await? {
                Some(message) if matches(&message) => return Ok(message),
                Some(Message::Error { message }) => {
                    return Err(SyncError::Connection(format!("host error: {message}")).into());
                }
                Some(_) => {}
                None => return Err(SyncError::Timeout(what.to_string()).into()),
            }
        }
    }

    /// Ask the host for the full array and adopt it. Local-only clients
    /// return their own items.
    ///
    /// # Errors
    ///
    /// Returns a sync timeout if the host does not answer.
    pub async fn request_items(&mut self, timeout: Duration) -> Result<Vec<Item>> {
        if !self.is_connected() {
            return self.library.items();
        }
        self.forward(&Message::GetItems).await;
        self.wait_for(timeout, "items-updated", |m| {
            matches!(m, Message::ItemsUpdated { .. })
        })
        .await?;
        self.library.items()
    }

    /// Round-trip a `ping`, returning the latency.
    ///
    /// # Errors
    ///
    /// Returns a sync error when disconnected or on timeout.
    pub async fn ping(&mut self, timeout: Duration) -> Result<Duration> {
        if !self.is_connected() {
            return Err(SyncError::Connection("not connected".to_string()).into());
        }
        let started = Instant::now();
        self.forward(&Message::Ping).await;
        self.wait_for(timeout, "pong", |m| matches!(m, Message::Pong))
            .await?;
        Ok(started.elapsed())
    }

    /// Scrape through the host when connected, otherwise directly.
    /// Never fails; problems yield empty metadata.
    pub async fn fetch_metadata(&mut self, url: &str, timeout: Duration) -> Metadata {
        if !self.is_connected() {
            return self.fetcher.fetch(url).await;
        }
        self.forward(&Message::FetchMetadata {
            url: url.to_string(),
        })
        .await;
        let wanted = url.to_string();
        match self
            .wait_for(timeout, "metadata", |m| {
                matches!(m, Message::Metadata { url, .. } if *url == wanted)
            })
            .await
        {
            Ok(Message::Metadata { title, image, .. }) => Metadata { title, image },
            Ok(_) => Metadata::default(),
            Err(e) => {
                tracing::warn!(url, error = %e, "metadata via host failed");
                Metadata::default()
            }
        }
    }
}

fn new_peer_id() -> String {
    format!("peer-{}", uuid::Uuid::new_v4().simple())
}
