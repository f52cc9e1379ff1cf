//! Shared application state for the observer server.
//!
//! [`AppState`] ties the subscriber registry, the broadcaster that feeds
//! it, and (when a relay loop is attached) the loop's control state that
//! the status endpoints report from.

use std::sync::Arc;

use groundlink_core::control::RelayControl;
use groundlink_types::RelayStats;

use crate::broadcaster::Broadcaster;
use crate::registry::{ConnectionRegistry, DEFAULT_QUEUE_CAPACITY};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live `WebSocket` subscribers.
    pub registry: Arc<ConnectionRegistry>,
    /// Fan-out over `registry`; handed to the relay loop as its sink.
    pub broadcaster: Arc<Broadcaster>,
    /// Relay loop control state (present when a loop is attached).
    pub control: Option<Arc<RelayControl>>,
}

impl AppState {
    /// Create state with no relay loop attached.
    pub fn new(queue_capacity: usize) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(queue_capacity));
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));
        Self {
            registry,
            broadcaster,
            control: None,
        }
    }

    /// Create state reporting on `control`.
    pub fn with_control(queue_capacity: usize, control: Arc<RelayControl>) -> Self {
        Self {
            control: Some(control),
            ..Self::new(queue_capacity)
        }
    }

    /// Current relay counters, or all-zero stats without a loop.
    pub fn stats(&self) -> RelayStats {
        self.control
            .as_ref()
            .map_or_else(RelayStats::default, |control| control.stats())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
