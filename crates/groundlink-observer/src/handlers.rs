//! HTTP endpoint handlers for the observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Relay counters and subscriber count |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::Uri;
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, Utc};
use groundlink_types::RelayStats;
use serde::Serialize;

use crate::error::ObserverError;
use crate::state::AppState;

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Relay loop counters.
    pub relay: RelayStats,
    /// Share of ticks with data that were broadcast, in percent.
    pub efficiency_percent: f64,
    /// Connected `WebSocket` subscribers.
    pub subscribers: usize,
    /// When the current relay run started.
    pub started_at: Option<DateTime<Utc>>,
}

fn status(state: &AppState) -> StatusResponse {
    let relay = state.stats();
    StatusResponse {
        relay,
        efficiency_percent: relay.efficiency_percent(),
        subscribers: state.registry.len(),
        started_at: state.control.as_ref().and_then(|control| control.started_at()),
    }
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing relay status.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = status(&state);
    let (label, class) = if status.relay.running {
        ("RUNNING", "ok")
    } else {
        ("STOPPED", "off")
    };
    let efficiency = format!("{:.1}", status.efficiency_percent);
    let last = status
        .relay
        .last_timestamp_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| String::from("--"), |ts| ts.format("%H:%M:%S%.3f").to_string());
    let subscribers = status.subscribers;
    let broadcasts = status.relay.broadcasts;
    let duplicates = status.relay.duplicates;
    let errors = status.relay.source_errors;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Groundlink Relay</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        .ok {{ color: #3fb950; font-weight: bold; }}
        .off {{ color: #f85149; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
    </style>
</head>
<body>
    <h1>Groundlink Relay</h1>
    <p class="subtitle">Static-fire telemetry relay</p>

    <p>Relay: <span class="{class}">{label}</span></p>

    <div>
        <div class="metric"><div class="label">Subscribers</div><div class="value">{subscribers}</div></div>
        <div class="metric"><div class="label">Broadcasts</div><div class="value">{broadcasts}</div></div>
        <div class="metric"><div class="label">Skipped</div><div class="value">{duplicates}</div></div>
        <div class="metric"><div class="label">Efficiency</div><div class="value">{efficiency}%</div></div>
        <div class="metric"><div class="label">Source errors</div><div class="value">{errors}</div></div>
        <div class="metric"><div class="label">Last sample (UTC)</div><div class="value">{last}</div></div>
    </div>

    <p><a href="/api/status">/api/status</a> -- JSON status</p>
    <p><code>ws://host:port/ws</code> -- Live snapshot stream</p>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Return relay counters and the subscriber count.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(serde_json::to_value(status(&state))?))
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// JSON 404 for unknown routes.
pub async fn not_found(uri: Uri) -> ObserverError {
    ObserverError::NotFound(uri.path().to_owned())
}
