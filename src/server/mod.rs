//! Local HTTP/WebSocket server.
//!
//! Serves the item API to the browser extension and the mobile companion,
//! proxies metadata scraping, hosts the `/ws` sync channel and, when
//! configured, the static mobile bundle. Every route goes through the shared
//! [`SyncHub`], so REST mutations are pushed to WebSocket clients too.

mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::model::{generate_id, now_millis, Item};
use crate::sync::SyncHub;

pub use ws::ws_handler;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<SyncHub>,
}

/// Error wrapper that renders as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.error_code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(json!({
            "error": {
                "code": code.as_str(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the router. `static_dir`, when set, serves the mobile bundle for
/// every path the API does not claim.
pub fn router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/api/items", get(list_items).post(save_item).put(update_items))
        .route("/api/items/:id", put(update_item).delete(delete_item))
        .route("/api/items/:id/pin", post(toggle_pin))
        .route("/api/metadata", get(fetch_metadata))
        .route("/ws", get(ws_handler))
        .route("/health", get(health));

    let api = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    api.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, hub: Arc<SyncHub>, static_dir: Option<PathBuf>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "server listening");

    let app = router(AppState { hub }, static_dir);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let items = state.hub.items().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "items": items.len(),
        "subscribers": state.hub.subscriber_count(),
    })))
}

async fn list_items(State(state): State<AppState>) -> ApiResult<Json<Vec<Item>>> {
    Ok(Json(state.hub.items().await?))
}

/// Captures may omit `id` and `createdAt`; the host fills them in.
fn item_from_capture(mut value: Value) -> Result<Item> {
    let Value::Object(map) = &mut value else {
        return Err(Error::InvalidArgument("item must be a JSON object".to_string()));
    };
    if map.get("id").is_none_or(Value::is_null) {
        map.insert("id".to_string(), Value::String(generate_id()));
    }
    if map.get("createdAt").is_none_or(Value::is_null) {
        map.insert("createdAt".to_string(), Value::from(now_millis()));
    }
    Ok(serde_json::from_value(value)?)
}

async fn save_item(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Vec<Item>>> {
    let item = item_from_capture(body)?;
    Ok(Json(state.hub.save_item(item).await?))
}

async fn update_items(
    State(state): State<AppState>,
    Json(items): Json<Vec<Item>>,
) -> ApiResult<Json<Vec<Item>>> {
    Ok(Json(state.hub.update_items(items).await?))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut item): Json<Item>,
) -> ApiResult<Json<Vec<Item>>> {
    item.id = id;
    Ok(Json(state.hub.update_item(item).await?))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Item>>> {
    Ok(Json(state.hub.delete_item(&id).await?))
}

async fn toggle_pin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Item>>> {
    Ok(Json(state.hub.toggle_pin(&id).await?))
}

#[derive(Debug, Deserialize)]
struct MetadataQuery {
    #[serde(default)]
    url: String,
}

async fn fetch_metadata(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> Json<Metadata> {
    Json(state.hub.fetch_metadata(&query.url).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;
    use crate::metadata::MetadataFetcher;
    use crate::storage::MemoryStore;
    use crate::sync::Message;
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message as Frame;

    async fn spawn_test_server(static_dir: Option<PathBuf>) -> (String, Arc<SyncHub>) {
        let hub = Arc::new(SyncHub::new(
            Library::new(Box::new(MemoryStore::new())),
            MetadataFetcher::default(),
        ));
        let app = router(AppState { hub: hub.clone() }, static_dir);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), hub)
    }

    /// Next text frame, skipping pings.
    async fn next_text<S>(ws: &mut S) -> String
    where
        S: futures::Stream<Item = std::result::Result<Frame, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(std::time::Duration::from_secs(5), ws.next())
                .await
                .expect("timeout waiting for WS message")
                .expect("stream ended")
                .expect("WS error");
            if let Frame::Text(text) = frame {
                return text;
            }
        }
    }

    #[tokio::test]
    async fn test_rest_crud() {
        let (base, _hub) = spawn_test_server(None).await;
        let client = reqwest::Client::new();

        let items: Vec<Item> = client
            .post(format!("{base}/api/items"))
            .json(&json!({"url": "https://example.com", "title": "Example"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        let id = items[0].id.clone();
        assert!(!id.is_empty());
        assert!(items[0].created_at > 0);

        let items: Vec<Item> = client
            .post(format!("{base}/api/items/{id}/pin"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(items[0].pinned);

        let mut edited = items[0].clone();
        edited.note = "edited".into();
        let items: Vec<Item> = client
            .put(format!("{base}/api/items/{id}"))
            .json(&edited)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(items[0].note, "edited");

        let items: Vec<Item> = client
            .delete(format!("{base}/api/items/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_json_404() {
        let (base, _hub) = spawn_test_server(None).await;
        let response = reqwest::Client::new()
            .put(format!("{base}/api/items/ghost"))
            .header("origin", "http://localhost:5173")
            .json(&json!({"id": "ghost"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], "ITEM_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_metadata_never_errors() {
        let (base, _hub) = spawn_test_server(None).await;
        let body: Value = reqwest::get(format!("{base}/api/metadata?url=notaurl"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"title": "", "image": ""}));
    }

    #[tokio::test]
    async fn test_rest_mutation_reaches_websocket() {
        let (base, _hub) = spawn_test_server(None).await;
        let ws_url = base.replace("http://", "ws://") + "/ws";
        let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        reqwest::Client::new()
            .post(format!("{base}/api/items"))
            .json(&json!({"id": "rest-1", "title": "from rest"}))
            .send()
            .await
            .unwrap();

        match Message::parse(&next_text(&mut ws).await).unwrap() {
            Message::ItemsUpdated { items } => assert_eq!(items[0].id, "rest-1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_websocket_request_reply() {
        let (base, _hub) = spawn_test_server(None).await;
        let ws_url = base.replace("http://", "ws://") + "/ws";
        let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();

        ws.send(Frame::Text(Message::Ping.to_json().unwrap()))
            .await
            .unwrap();
        assert_eq!(Message::parse(&next_text(&mut ws).await).unwrap(), Message::Pong);

        ws.send(Frame::Text("garbage".to_string())).await.unwrap();
        assert!(matches!(
            Message::parse(&next_text(&mut ws).await).unwrap(),
            Message::Error { .. }
        ));

        ws.send(Frame::Text(Message::GetItems.to_json().unwrap()))
            .await
            .unwrap();
        assert!(matches!(
            Message::parse(&next_text(&mut ws).await).unwrap(),
            Message::ItemsUpdated { .. }
        ));
    }

    #[tokio::test]
    async fn test_static_bundle_fallback() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>mobile</h1>").unwrap();
        let (base, _hub) = spawn_test_server(Some(dir.path().to_path_buf())).await;

        let body = reqwest::get(format!("{base}/index.html"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("mobile"));

        let health: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    }

    #[tokio::test]
    async fn test_two_peers_see_each_others_changes() {
        let (base, hub) = spawn_test_server(None).await;
        let ws_url = base.replace("http://", "ws://") + "/ws";
        let (mut a, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
        let (mut b, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(hub.subscriber_count(), 2);

        let item: Item = serde_json::from_value(json!({"id": "from-a", "title": "A"})).unwrap();
        a.send(Frame::Text(Message::SaveItem { item }.to_json().unwrap()))
            .await
            .unwrap();

        for peer in [&mut a, &mut b] {
            match Message::parse(&next_text(peer).await).unwrap() {
                Message::ItemsUpdated { items } => {
                    assert_eq!(items.len(), 1);
                    assert_eq!(items[0].id, "from-a");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_sync_client_mirrors_host() {
        use crate::sync::{SyncClient, DEFAULT_CONNECT_TIMEOUT};

        let (base, hub) = spawn_test_server(None).await;
        hub.save_item(serde_json::from_value(json!({"id": "seed", "createdAt": 1})).unwrap())
            .await
            .unwrap();

        let mut client = SyncClient::connect(
            Library::new(Box::new(MemoryStore::new())),
            &base,
            DEFAULT_CONNECT_TIMEOUT,
        )
        .await;
        assert!(client.is_connected());

        let items = client.request_items(DEFAULT_CONNECT_TIMEOUT).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "seed");

        let local = client.toggle_pin("seed").await.unwrap();
        assert!(local[0].pinned);

        let mut pinned_on_host = false;
        for _ in 0..50 {
            if hub.items().await.unwrap().iter().any(|i| i.id == "seed" && i.pinned) {
                pinned_on_host = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(pinned_on_host);

        let latency = client.ping(DEFAULT_CONNECT_TIMEOUT).await.unwrap();
        assert!(latency < DEFAULT_CONNECT_TIMEOUT);
    }
}
