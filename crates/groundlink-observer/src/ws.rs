//! `WebSocket` handler for the snapshot stream.
//!
//! Clients connect to `GET /ws` (or `GET /ws/telemetry`) and receive one
//! JSON-encoded [`Snapshot`](groundlink_types::Snapshot) text frame per
//! broadcast. Each connection registers a subscriber and runs its own
//! writer: it drains the subscriber's queue in order, answers pings, and
//! deregisters on any exit.
//!
//! Nothing is replayed on connect; a client sees the next broadcast.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, info};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming snapshots.
///
/// # Route
///
/// `GET /ws`, `GET /ws/telemetry`
pub async fn ws_telemetry(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle one subscriber's lifecycle.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscriber = state.registry.add();
    let id = subscriber.id();
    info!(
        subscriber = %id,
        subscribers = state.registry.len(),
        "Subscriber connected"
    );

    loop {
        tokio::select! {
            queued = subscriber.recv() => {
                let Some(payload) = queued else {
                    debug!(subscriber = %id, "Subscriber removed by broadcaster");
                    break;
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    debug!(subscriber = %id, "Send failed, client gone");
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        subscriber.mark_closing();
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(subscriber = %id, "Pong failed, client gone");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(subscriber = %id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {
                        // Clients have nothing to say; ignore text and binary.
                    }
                }
            }
        }
    }

    state.registry.remove(id);
    info!(
        subscriber = %id,
        subscribers = state.registry.len(),
        "Subscriber disconnected"
    );
}
