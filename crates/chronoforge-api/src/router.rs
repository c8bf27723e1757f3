//! Axum router construction for the ChronoForge API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the API server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `POST /api/time/{id}/events` -- append an event
/// - `GET /api/time/{id}/events` -- event history
/// - `GET /api/time/search` -- search events
/// - `POST /api/docs/{id}/set` -- merge document fields
/// - `POST /api/docs/{id}/del` -- remove document keys
/// - `GET /api/docs/{id}` -- current or as-of-instant document
/// - `GET /ws/events` -- `WebSocket` live event feed
///
/// CORS is configured to allow any origin for development. In production
/// this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // Event log
        .route(
            "/api/time/{id}/events",
            post(handlers::append_event).get(handlers::read_history),
        )
        .route("/api/time/search", get(handlers::search_events))
        // Documents
        .route("/api/docs/{id}/set", post(handlers::set_document))
        .route("/api/docs/{id}/del", post(handlers::delete_document_keys))
        .route("/api/docs/{id}", get(handlers::get_document))
        // WebSocket
        .route("/ws/events", get(ws::ws_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
