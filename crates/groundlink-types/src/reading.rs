//! Continuous sensor readings.
//!
//! A [`ContinuousReading`] is one row from the time-series store: a
//! timestamp plus N named numeric fields (pressure transducers, load cells,
//! thermocouples). The timestamp is the dedup key -- two readings with the
//! same timestamp are the same underlying sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One named continuous channel value.
///
/// `value` is `None` when the store had no value for the channel (SQL
/// `NULL`, or a secondary table with no row yet). That is deliberately
/// distinct from `Some(0.0)`: zero is a legitimate sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChannelValue {
    /// Channel identifier, mirroring the store column name (e.g. `pt1`).
    pub id: String,
    /// The sampled value, if present.
    pub value: Option<f64>,
}

impl ChannelValue {
    /// Create a channel value.
    pub fn new(id: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

/// One sample of every continuous channel, as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousReading {
    timestamp: DateTime<Utc>,
    values: Vec<ChannelValue>,
    continuity_raw: Option<f64>,
}

impl ContinuousReading {
    /// Build a reading. `values` keeps the order given; consumers may
    /// render positionally.
    pub const fn new(
        timestamp: DateTime<Utc>,
        values: Vec<ChannelValue>,
        continuity_raw: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            values,
            continuity_raw,
        }
    }

    /// Source timestamp of the sample.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Channel values in deployment order.
    pub fn values(&self) -> &[ChannelValue] {
        &self.values
    }

    /// Raw continuity-circuit voltage, if the store reported one.
    pub const fn continuity_raw(&self) -> Option<f64> {
        self.continuity_raw
    }
}
