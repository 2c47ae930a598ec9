//! `/ws` sync channel.
//!
//! Each connection gets the hub's broadcast stream plus a private channel for
//! direct replies (`items-updated` for `get-items`, `metadata`, `pong`,
//! `error`). Malformed frames are answered, never fatal.

use std::time::Duration;

use axum::extract::ws::{Message as Frame, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use super::AppState;
use crate::sync::Message;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Upgrade handler for `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.hub.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Message>(16);
    tracing::info!(peers = state.hub.subscriber_count(), "sync peer connected");

    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        loop {
            let outgoing = tokio::select! {
                update = updates.recv() => match update {
                    Ok(message) => message,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(missed = n, "sync peer lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(message) => message,
                    None => break,
                },
                _ = ping.tick() => {
                    if sender.send(Frame::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match outgoing.to_json() {
                Ok(json) => {
                    if sender.send(Frame::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to encode sync message"),
            }
        }
    });

    let hub = state.hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            let text = match frame {
                Frame::Text(text) => text,
                Frame::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Frame::Close(_) => break,
                Frame::Ping(_) | Frame::Pong(_) => continue,
            };
            if let Some(reply) = hub.handle_text(&text).await {
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    tracing::info!("sync peer disconnected");
}
