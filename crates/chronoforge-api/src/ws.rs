//! `WebSocket` handler for the live event feed.
//!
//! Clients connect to `GET /ws/events` and receive a JSON-encoded
//! [`EventView`](crate::handlers::EventView) for every event the store
//! accepts from that point forward, optionally filtered to one entity via
//! `?entity=`. The handler uses a [`broadcast::Receiver`] so all connected
//! clients see the same stream.
//!
//! If a client falls behind, lagged messages are silently skipped and the
//! client resumes from the most recent event. Delivery is at-least-once;
//! consumers fold idempotently.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chronoforge_core::TemporalId;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::handlers::{EventView, parse_entity_id};
use crate::state::AppState;

/// Query parameters for `GET /ws/events`.
#[derive(Debug, serde::Deserialize)]
pub struct StreamQuery {
    /// Restrict the feed to one entity.
    pub entity: Option<String>,
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin streaming
/// accepted events.
///
/// # Route
///
/// `GET /ws/events?entity=`
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = params
        .entity
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_entity_id)
        .transpose()?;

    Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, filter)))
}

/// Handle the `WebSocket` lifecycle: subscribe to the event bus and forward
/// each accepted event as a text frame.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, filter: Option<TemporalId>) {
    debug!("WebSocket client connected");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            // Receive an accepted event from the store.
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Some(entity) = filter
                            && event.entity_id != entity
                        {
                            continue;
                        }
                        let json = match serde_json::to_string(&EventView::from(&event)) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event view: {e}");
                                continue;
                            }
                        };
                        let msg: Message = Message::Text(json.into());
                        if socket.send(msg).await.is_err() {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let pong = Message::Pong(data);
                        if socket.send(pong).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Ignore other message types (text, binary from client).
                    }
                }
            }
        }
    }
}
