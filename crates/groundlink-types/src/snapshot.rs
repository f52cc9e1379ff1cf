//! The unit of broadcast.
//!
//! A [`Snapshot`] is fully self-describing: a client that only ever
//! receives snapshots can render the whole dashboard. Every message on the
//! wire is one complete snapshot -- no batching, no deltas.
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "timestamp": 1718000000123,
//!   "telemetry": [{ "id": "pt1", "value": 412.5 }, { "id": "lc1", "value": null }],
//!   "switches": { "switch1": false, "continuity": true, "launchKey": false, "abort": false }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::channels::DiscreteChannelSet;
use crate::reading::ChannelValue;

/// Immutable merged state for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Source timestamp of the continuous sample, milliseconds since the
    /// Unix epoch on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub timestamp: DateTime<Utc>,
    /// Continuous channel values, in stable per-deployment order.
    pub telemetry: Vec<ChannelValue>,
    /// Discrete channel state, including derived overrides.
    pub switches: DiscreteChannelSet,
}

impl Snapshot {
    /// Serialize to the JSON text sent to subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error only if a value cannot be represented in JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
