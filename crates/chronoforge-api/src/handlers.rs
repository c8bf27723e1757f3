//! REST endpoint handlers for the ChronoForge API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `POST` | `/api/time/:id/events` | Append one event (optionally seeded) |
//! | `GET` | `/api/time/:id/events` | Full or time-bounded event history |
//! | `GET` | `/api/time/search` | Search events across entities |
//! | `POST` | `/api/docs/:id/set` | Merge fields into the entity document |
//! | `POST` | `/api/docs/:id/del` | Remove keys from the entity document |
//! | `GET` | `/api/docs/:id` | Current or as-of-instant document |
//!
//! A caller-supplied seed (`X-CF-Seed` header or `seed` query parameter)
//! runs the write under a deterministic context: fixed timestamp and
//! reproducible identifiers. The `X-CF-Node` header (or the append body's
//! `node` field) overrides the logical producer identity.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, Utc};
use chronoforge_core::{Determinism, TemporalEvent, TemporalId, VectorClock};
use chronoforge_store::{SearchQuery, document_at};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying a deterministic seed for the request.
pub const SEED_HEADER: &str = "x-cf-seed";

/// Header overriding the logical producer node for the request.
pub const NODE_HEADER: &str = "x-cf-node";

// ---------------------------------------------------------------------------
// Wire representations and parameter structs
// ---------------------------------------------------------------------------

/// Event representation served to API and stream consumers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EventView {
    /// Entity identifier in string form.
    pub entity_id: String,
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Producer-assigned instant (ISO-8601).
    pub observed_at: DateTime<Utc>,
    /// Causal clock as a node-to-counter mapping.
    pub clock: VectorClock,
    /// Event payload.
    pub payload: Map<String, Value>,
    /// Logical producer identity.
    pub node: String,
}

impl From<&TemporalEvent> for EventView {
    fn from(event: &TemporalEvent) -> Self {
        Self {
            entity_id: event.entity_id.to_string(),
            event_type: event.event_type.clone(),
            observed_at: event.observed_at,
            clock: event.clock.clone(),
            payload: event.payload.clone(),
            node: event.node.clone(),
        }
    }
}

/// Request body for `POST /api/time/:id/events`.
#[derive(Debug, serde::Deserialize)]
pub struct AppendBody {
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload; absent means empty.
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
    /// Producer node override; absent means the resolved default.
    #[serde(default)]
    pub node: Option<String>,
}

/// Query parameters for `POST /api/time/:id/events`.
#[derive(Debug, serde::Deserialize)]
pub struct AppendQuery {
    /// Deterministic seed; the `X-CF-Seed` header takes precedence.
    pub seed: Option<i64>,
}

/// Query parameters for `GET /api/time/:id/events`.
#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    /// Inclusive upper bound on `observed_at` (ISO-8601).
    #[serde(alias = "asOf")]
    pub as_of: Option<String>,
}

/// Query parameters for `GET /api/time/search`.
#[derive(Debug, serde::Deserialize)]
pub struct SearchParams {
    /// Exact event type to match.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Inclusive lower bound on `observed_at` (ISO-8601).
    pub from: Option<String>,
    /// Inclusive upper bound on `observed_at` (ISO-8601).
    pub to: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Top-level payload field to compare.
    pub field: Option<String>,
    /// Expected string form of the payload field.
    pub value: Option<String>,
}

/// Query parameters for `GET /api/docs/:id`.
#[derive(Debug, serde::Deserialize)]
pub struct DocQuery {
    /// Reconstruct the document as of this instant (ISO-8601) instead of
    /// serving the materialized view.
    pub at: Option<String>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page listing the API surface.
pub async fn index() -> impl IntoResponse {
    Html(
        r"<!DOCTYPE html>
<html lang='en'>
<head><meta charset='utf-8'><title>ChronoForge</title></head>
<body>
    <h1>ChronoForge</h1>
    <p>Temporal event store: causally-ordered history, live projection, time travel.</p>
    <ul>
        <li>POST /api/time/:id/events -- append an event (X-CF-Seed for determinism)</li>
        <li>GET /api/time/:id/events?as_of= -- event history</li>
        <li>GET /api/time/search -- search events</li>
        <li>POST /api/docs/:id/set -- merge document fields</li>
        <li>POST /api/docs/:id/del -- remove document keys</li>
        <li>GET /api/docs/:id?at= -- current or point-in-time document</li>
        <li>ws://host:port/ws/events?entity= -- live event feed</li>
    </ul>
</body>
</html>",
    )
}

// ---------------------------------------------------------------------------
// POST /api/time/:id/events -- append one event
// ---------------------------------------------------------------------------

/// Append one event to an entity's history.
///
/// With a seed (header or query), the event is produced under a
/// deterministic context; otherwise the process's ambient context stamps
/// it. The response is `202 Accepted` once the store has durably accepted
/// the event.
pub async fn append_event(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    Query(params): Query<AppendQuery>,
    headers: HeaderMap,
    Json(body): Json<AppendBody>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = parse_entity_id(&id_str)?;

    let scoped = scoped_context(&headers, params.seed, body.node.as_deref())?;
    let det = scoped.as_ref().unwrap_or(&state.determinism);

    let event = TemporalEvent::observed(
        det,
        entity_id,
        &body.event_type,
        body.payload.unwrap_or_default(),
    );
    state.store.append(vec![event]).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "queued"})),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/time/:id/events -- event history
// ---------------------------------------------------------------------------

/// Return the entity's event history, ascending by `observed_at`,
/// optionally bounded to events at or before `as_of`.
pub async fn read_history(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = parse_entity_id(&id_str)?;
    let cutoff = params.as_of.as_deref().map(parse_instant).transpose()?;

    let events = state.store.read(entity_id).await?;
    let views: Vec<EventView> = events
        .iter()
        .filter(|e| cutoff.is_none_or(|at| e.observed_at <= at))
        .map(EventView::from)
        .collect();

    Ok(Json(views))
}

// ---------------------------------------------------------------------------
// GET /api/time/search -- search events
// ---------------------------------------------------------------------------

/// Search events across entities. All filters are optional and combine
/// with logical AND.
pub async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = SearchQuery {
        event_type: params.event_type,
        from: params.from.as_deref().map(parse_instant).transpose()?,
        to: params.to.as_deref().map(parse_instant).transpose()?,
        limit: params.limit,
        field: params.field,
        value: params.value,
    };

    let events = state.store.search(&query).await?;
    let views: Vec<EventView> = events.iter().map(EventView::from).collect();
    Ok(Json(views))
}

// ---------------------------------------------------------------------------
// POST /api/docs/:id/set -- merge document fields
// ---------------------------------------------------------------------------

/// Record a `DOC_SET` event merging the request body's fields into the
/// entity's document.
pub async fn set_document(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    headers: HeaderMap,
    Json(fields): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = parse_entity_id(&id_str)?;
    let scoped = scoped_context(&headers, None, None)?;
    let det = scoped.as_ref().unwrap_or(&state.determinism);

    let event = TemporalEvent::doc_set(det, entity_id, fields);
    state.store.append(vec![event]).await?;
    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// POST /api/docs/:id/del -- remove document keys
// ---------------------------------------------------------------------------

/// Record a `DOC_DEL` event removing the request body's keys from the
/// entity's document.
pub async fn delete_document_keys(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    headers: HeaderMap,
    Json(keys): Json<Vec<String>>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = parse_entity_id(&id_str)?;
    let scoped = scoped_context(&headers, None, None)?;
    let det = scoped.as_ref().unwrap_or(&state.determinism);

    let event = TemporalEvent::doc_del(det, entity_id, keys);
    state.store.append(vec![event]).await?;
    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// GET /api/docs/:id -- current or point-in-time document
// ---------------------------------------------------------------------------

/// Return the entity's materialized document, or reconstruct it as of the
/// `at` instant by replaying history (no write, no tie-break).
///
/// An entity with no document yields `{}`.
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    Query(params): Query<DocQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_id = parse_entity_id(&id_str)?;

    if let Some(at) = params.at.as_deref() {
        let cutoff = parse_instant(at)?;
        let doc = document_at(state.store.as_ref(), entity_id, Some(cutoff)).await?;
        return Ok(Json(Value::Object(doc)));
    }

    let snapshot = state.snapshots.get(entity_id).await?;
    let doc = snapshot.map(|s| s.doc).unwrap_or_default();
    Ok(Json(Value::Object(doc)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an entity identifier from its string form.
pub(crate) fn parse_entity_id(s: &str) -> Result<TemporalId, ApiError> {
    s.parse()
        .map_err(|e| ApiError::InvalidEntityId(format!("{s}: {e}")))
}

/// Parse an ISO-8601 instant.
fn parse_instant(s: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(s)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| ApiError::InvalidQuery(format!("bad instant {s}: {e}")))
}

/// Build the request-scoped determinism context, if the request asked for
/// one.
///
/// Seed precedence: `X-CF-Seed` header, then the query parameter. Node
/// precedence: explicit (body) value, then the `X-CF-Node` header. A node
/// override without a seed still scopes the producer identity; neither
/// yields `None` and the ambient context applies.
fn scoped_context(
    headers: &HeaderMap,
    query_seed: Option<i64>,
    explicit_node: Option<&str>,
) -> Result<Option<Determinism>, ApiError> {
    let node = explicit_node
        .filter(|n| !n.trim().is_empty())
        .map(str::to_owned)
        .or_else(|| header_value(headers, NODE_HEADER));
    let seed = header_seed(headers)?.or(query_seed);

    match (seed, node) {
        (Some(seed), node) => Ok(Some(Determinism::seeded(node.as_deref(), seed)?)),
        (None, Some(node)) => Ok(Some(Determinism::wall_on(&node))),
        (None, None) => Ok(None),
    }
}

/// Read a non-blank header as a string.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Parse the deterministic seed header, if present.
fn header_seed(headers: &HeaderMap) -> Result<Option<i64>, ApiError> {
    let Some(raw) = header_value(headers, SEED_HEADER) else {
        return Ok(None);
    };
    raw.parse::<i64>()
        .map(Some)
        .map_err(|e| ApiError::InvalidSeed(format!("{raw}: {e}")))
}
