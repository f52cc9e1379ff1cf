//! Snapshot fan-out to every registered subscriber.
//!
//! A snapshot is serialized once per broadcast and the same bytes are
//! queued for each member. Queuing never waits: a subscriber whose queue
//! is full, whose connection is gone, or who is closing is removed from
//! the registry on the spot. Delivery failures never reach the tick loop.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use groundlink_core::scheduler::SnapshotSink;
use groundlink_types::{Snapshot, SubscriberId};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::registry::{ConnectionRegistry, Liveness};

/// Serializes snapshots and queues them for every subscriber.
#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub const fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this broadcaster sends to.
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Broadcast `snapshot`. Returns the number of subscribers it was
    /// queued for.
    pub fn send(&self, snapshot: &Snapshot) -> usize {
        match snapshot.to_json() {
            Ok(json) => self.send_text(&Utf8Bytes::from(json)),
            Err(e) => {
                warn!(error = %e, "Failed to serialize snapshot, not broadcasting");
                0
            }
        }
    }

    /// Queue an already-serialized payload for every subscriber.
    pub fn send_text(&self, payload: &Utf8Bytes) -> usize {
        let members = self.registry.members();
        let mut delivered: usize = 0;
        let mut dropped: Vec<SubscriberId> = Vec::new();

        for member in &members {
            if member.liveness() == Liveness::Closing {
                dropped.push(member.id());
                continue;
            }
            match member.try_send(payload.clone()) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = %member.id(), "Subscriber queue full, dropping subscriber");
                    dropped.push(member.id());
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %member.id(), "Subscriber gone, dropping");
                    dropped.push(member.id());
                }
            }
        }

        for id in dropped {
            self.registry.remove(id);
        }
        delivered
    }
}

impl SnapshotSink for Broadcaster {
    fn publish(&self, snapshot: &Snapshot) -> usize {
        self.send(snapshot)
    }
}
