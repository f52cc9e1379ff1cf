//! Subscriber fan-out and status API for the Groundlink relay.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`, alias `/ws/telemetry`) streaming one
//!   JSON snapshot per broadcast to every connected dashboard
//! - **Status endpoint** (`/api/status`) with relay counters
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! The relay loop hands each snapshot to the [`Broadcaster`], which
//! serializes it once and queues the bytes on every subscriber's bounded
//! channel without waiting. Each connection's writer task drains its own
//! queue, so socket latency never reaches the tick loop. Subscribers that
//! fall behind or disappear are dropped from the [`ConnectionRegistry`].
//!
//! [`Broadcaster`]: broadcaster::Broadcaster
//! [`ConnectionRegistry`]: registry::ConnectionRegistry

pub mod broadcaster;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use broadcaster::Broadcaster;
pub use registry::{ConnectionRegistry, Liveness, SubscriberHandle};
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::{ObserverHandle, StartupError, spawn_observer};
pub use state::AppState;
