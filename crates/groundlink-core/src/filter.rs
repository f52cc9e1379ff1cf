//! Suppress snapshots that would tell subscribers nothing new.
//!
//! A snapshot is worth broadcasting when its source timestamp differs from
//! the last one sent (new data) or its discrete content differs (an
//! operator action between ingests). Comparison is structural over the
//! fixed channel set: no serialization, no allocation.

use chrono::{DateTime, Utc};
use groundlink_types::{DiscreteChannelSet, Snapshot};

/// What was last broadcast, plus dedup counters.
#[derive(Debug, Clone, Default)]
pub struct LastBroadcastState {
    timestamp: Option<DateTime<Utc>>,
    switches: Option<DiscreteChannelSet>,
    broadcast_count: u64,
    duplicate_count: u64,
}

impl LastBroadcastState {
    /// Empty state: the next snapshot is always broadcast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `snapshot` as the last broadcast.
    pub const fn record_broadcast(&mut self, snapshot: &Snapshot) {
        self.timestamp = Some(snapshot.timestamp);
        self.switches = Some(snapshot.switches);
        self.broadcast_count = self.broadcast_count.saturating_add(1);
    }

    /// Count a snapshot that was suppressed.
    pub const fn record_duplicate(&mut self) {
        self.duplicate_count = self.duplicate_count.saturating_add(1);
    }

    /// Timestamp of the last broadcast snapshot.
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Number of snapshots broadcast.
    pub const fn broadcast_count(&self) -> u64 {
        self.broadcast_count
    }

    /// Number of snapshots suppressed as duplicates.
    pub const fn duplicate_count(&self) -> u64 {
        self.duplicate_count
    }
}

/// Decide whether `snapshot` differs from what was last broadcast.
pub fn should_broadcast(snapshot: &Snapshot, last: &LastBroadcastState) -> bool {
    match (last.timestamp, last.switches) {
        (Some(timestamp), Some(switches)) => {
            snapshot.timestamp != timestamp || snapshot.switches != switches
        }
        _ => true,
    }
}
