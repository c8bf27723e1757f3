//! Integration tests for the ChronoForge API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing without
//! needing a live network connection. The store behind the router is the
//! in-process reference backend.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chronoforge_api::router::build_router;
use chronoforge_api::state::AppState;
use chronoforge_core::Determinism;
use chronoforge_store::Projector;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Router plus the shared state it serves, with a live projector task.
fn make_test_app() -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::in_memory(Determinism::wall_on("api")));
    let projector = Projector::new(Arc::clone(&state.snapshots));
    tokio::spawn(projector.run(state.subscribe()));
    (build_router(Arc::clone(&state)), state)
}

fn entity(n: u128) -> String {
    uuid::Uuid::from_u128(n).to_string()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_json(router: &Router, uri: &str) -> Value {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
    body_to_json(response.into_body()).await
}

/// Poll a document endpoint until it matches, tolerating projector lag.
async fn wait_for_document(router: &Router, uri: &str, expected: &Value) {
    for _ in 0..100 {
        if &get_json(router, uri).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("document at {uri} never reached {expected}");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn index_returns_html() {
    let (router, _state) = make_test_app();

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.contains("text/html"));
}

#[tokio::test]
async fn seeded_append_is_deterministic_and_idempotent() {
    let (router, _state) = make_test_app();
    let id = entity(1);
    let uri = format!("/api/time/{id}/events");
    let body = json!({"type": "DOC_SET", "payload": {"a": 1}, "node": "n1"});

    // The same seed produces byte-identical content, so the second append
    // is absorbed by the store.
    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(
                Request::post(uri.as_str())
                    .header("content-type", "application/json")
                    .header("X-CF-Seed", "100")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let history = get_json(&router, &uri).await;
    let events = history.as_array().unwrap();
    assert_eq!(events.len(), 1);
    // Seed 100 fixes the instant at epoch + 100 seconds.
    assert_eq!(events[0]["observed_at"], "1970-01-01T00:01:40Z");
    assert_eq!(events[0]["type"], "DOC_SET");
    assert_eq!(events[0]["node"], "n1");
    assert_eq!(events[0]["clock"], json!({"n1": 1}));
}

#[tokio::test]
async fn history_respects_the_as_of_bound() {
    let (router, _state) = make_test_app();
    let id = entity(2);
    let uri = format!("/api/time/{id}/events");

    for (seed, payload) in [(100, json!({"a": 1})), (300, json!({"a": 2, "b": 3}))] {
        let response = router
            .clone()
            .oneshot(
                Request::post(format!("{uri}?seed={seed}"))
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"type": "DOC_SET", "payload": payload}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let full = get_json(&router, &uri).await;
    assert_eq!(full.as_array().unwrap().len(), 2);

    let bounded = get_json(&router, &format!("{uri}?as_of=1970-01-01T00:03:00Z")).await;
    assert_eq!(bounded.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn document_projection_follows_set_and_del() {
    let (router, _state) = make_test_app();
    let id = entity(3);
    let doc_uri = format!("/api/docs/{id}");

    let response = router
        .clone()
        .oneshot(
            Request::post(format!("/api/docs/{id}/set"))
                .header("content-type", "application/json")
                .header("X-CF-Seed", "100")
                .body(Body::from(json!({"a": 1, "b": 2}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    wait_for_document(&router, &doc_uri, &json!({"a": 1, "b": 2})).await;

    let response = router
        .clone()
        .oneshot(
            Request::post(format!("/api/docs/{id}/del"))
                .header("content-type", "application/json")
                .header("X-CF-Seed", "200")
                .body(Body::from(json!(["a"]).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    wait_for_document(&router, &doc_uri, &json!({"b": 2})).await;
}

#[tokio::test]
async fn document_time_travel_reconstructs_earlier_state() {
    let (router, _state) = make_test_app();
    let id = entity(4);
    let events_uri = format!("/api/time/{id}/events");

    for (seed, payload) in [(100, json!({"a": 1})), (300, json!({"a": 2, "b": 3}))] {
        router
            .clone()
            .oneshot(
                Request::post(format!("{events_uri}?seed={seed}"))
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"type": "DOC_SET", "payload": payload}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    // Between the two events: only the first fold applies.
    let early = get_json(
        &router,
        &format!("/api/docs/{id}?at=1970-01-01T00:03:00Z"),
    )
    .await;
    assert_eq!(early, json!({"a": 1}));

    // After both: the full fold.
    let late = get_json(
        &router,
        &format!("/api/docs/{id}?at=1970-01-01T00:10:00Z"),
    )
    .await;
    assert_eq!(late, json!({"a": 2, "b": 3}));
}

#[tokio::test]
async fn unknown_document_is_empty_not_missing() {
    let (router, _state) = make_test_app();
    let doc = get_json(&router, &format!("/api/docs/{}", entity(99))).await;
    assert_eq!(doc, json!({}));
}

#[tokio::test]
async fn search_combines_type_and_field_filters() {
    let (router, _state) = make_test_app();

    for (n, seed, owner) in [(5_u128, 100, "ada"), (6, 200, "bob")] {
        let id = entity(n);
        router
            .clone()
            .oneshot(post_json(
                &format!("/api/time/{id}/events?seed={seed}"),
                &json!({"type": "DOC_SET", "payload": {"owner": owner}}),
            ))
            .await
            .unwrap();
    }

    let found = get_json(
        &router,
        "/api/time/search?type=DOC_SET&field=owner&value=ada",
    )
    .await;
    let events = found.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["payload"]["owner"], "ada");

    let bounded = get_json(
        &router,
        "/api/time/search?from=1970-01-01T00:00:00Z&to=1970-01-01T00:02:00Z",
    )
    .await;
    assert_eq!(bounded.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_entity_id_is_a_bad_request() {
    let (router, _state) = make_test_app();

    let response = router
        .oneshot(
            Request::get("/api/time/not-a-uuid/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_seed_is_a_bad_request() {
    let (router, _state) = make_test_app();
    let id = entity(7);

    let response = router
        .oneshot(
            Request::post(format!("/api/time/{id}/events"))
                .header("content-type", "application/json")
                .header("X-CF-Seed", "not-a-number")
                .body(Body::from(json!({"type": "DOC_SET"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_cutoff_is_a_bad_request() {
    let (router, _state) = make_test_app();
    let id = entity(8);

    let response = router
        .oneshot(
            Request::get(format!("/api/docs/{id}?at=yesterday"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
