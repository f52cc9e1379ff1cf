//! Integration tests for the observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use groundlink_core::control::RelayControl;
use groundlink_observer::registry::DEFAULT_QUEUE_CAPACITY;
use groundlink_observer::router::build_router;
use groundlink_observer::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

fn make_test_state() -> (Arc<AppState>, Arc<RelayControl>) {
    let control = Arc::new(RelayControl::new());
    control.mark_started();
    for _ in 0..4 {
        control.record_tick();
    }
    control.record_broadcast(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    control.record_duplicate();
    control.record_duplicate();
    control.record_duplicate();

    let state = Arc::new(AppState::with_control(
        DEFAULT_QUEUE_CAPACITY,
        Arc::clone(&control),
    ));
    (state, control)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =========================================================================
// Index
// =========================================================================

#[tokio::test]
async fn test_index_returns_html() {
    let (state, _control) = make_test_state();
    let router = build_router(state);

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

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("RUNNING"));
    assert!(html.contains("12:00:00.000"));
}

// =========================================================================
// Status
// =========================================================================

#[tokio::test]
async fn test_status_reports_counters() {
    let (state, _control) = make_test_state();
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["relay"]["running"], true);
    assert_eq!(json["relay"]["ticks"], 4);
    assert_eq!(json["relay"]["broadcasts"], 1);
    assert_eq!(json["relay"]["duplicates"], 3);
    assert_eq!(
        json["relay"]["last_timestamp_ms"],
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .unwrap()
            .timestamp_millis()
    );
    assert!((json["efficiency_percent"].as_f64().unwrap() - 25.0).abs() < 1e-9);
    assert_eq!(json["subscribers"], 0);
    assert!(json["started_at"].is_string());
}

#[tokio::test]
async fn test_status_counts_subscribers() {
    let (state, _control) = make_test_state();
    let _first = state.registry.add();
    let _second = state.registry.add();
    let router = build_router(Arc::clone(&state));

    let response = router
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["subscribers"], 2);
}

#[tokio::test]
async fn test_status_without_relay_loop() {
    let router = build_router(Arc::new(AppState::default()));

    let response = router
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["relay"]["running"], false);
    assert_eq!(json["relay"]["broadcasts"], 0);
    assert!(json["relay"]["last_timestamp_ms"].is_null());
    assert!(json["started_at"].is_null());
}

// =========================================================================
// Fallback and WebSocket route
// =========================================================================

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (state, _control) = make_test_state();
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("/api/nope"));
}

#[tokio::test]
async fn test_plain_get_on_ws_is_rejected() {
    for path in ["/ws", "/ws/telemetry"] {
        let (state, _control) = make_test_state();
        let router = build_router(state);

        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(
            response.status().is_client_error(),
            "{path} answered {}",
            response.status()
        );
    }
}
