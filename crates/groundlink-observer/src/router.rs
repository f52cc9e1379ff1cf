//! Axum router construction for the observer server.
//!
//! Assembles all routes (status + `WebSocket`) into a single [`Router`]
//! with CORS enabled for the dashboard.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws` -- `WebSocket` snapshot stream
/// - `GET /ws/telemetry` -- the same stream under the dashboard's path
/// - `GET /api/status` -- relay counters and subscriber count
///
/// CORS allows any origin: the dashboard is served separately and the
/// server binds to a local address by default.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws", get(ws::ws_telemetry))
        .route("/ws/telemetry", get(ws::ws_telemetry))
        .route("/api/status", get(handlers::get_status))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
