//! Merge a continuous reading with the discrete state into a [`Snapshot`].
//!
//! Two derived overrides are applied on top of the raw discrete state:
//!
//! - `continuity` is recomputed from the analog continuity voltage carried
//!   by the reading. Whatever the discrete feed reported is overwritten.
//! - When the abort interlock is enabled and `abort` is set, every firing
//!   switch and the launch key are forced to `false` in the snapshot. The
//!   switch state store itself is left untouched.

use groundlink_types::{ContinuousReading, DiscreteChannel, DiscreteChannelSet, Snapshot};

/// Voltage above which the igniter circuit is considered continuous.
pub const CONTINUITY_THRESHOLD: f64 = 2.5;

/// Derive the continuity flag from the raw analog voltage.
///
/// A missing voltage means continuity cannot be confirmed.
pub fn continuity_from_raw(raw: Option<f64>) -> bool {
    raw.is_some_and(|volts| volts > CONTINUITY_THRESHOLD)
}

/// Builds one snapshot per tick.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotBuilder {
    abort_forces_safe: bool,
}

impl SnapshotBuilder {
    /// Create a builder. With `abort_forces_safe` set, an engaged abort
    /// masks every firing channel in the produced snapshot.
    pub const fn new(abort_forces_safe: bool) -> Self {
        Self { abort_forces_safe }
    }

    /// Whether the abort interlock masks `switches`.
    pub const fn interlock_engaged(&self, switches: &DiscreteChannelSet) -> bool {
        self.abort_forces_safe && switches.abort
    }

    /// Merge `reading` and `switches`.
    ///
    /// Channel values are copied verbatim and in order; the timestamp is the
    /// reading's own.
    pub fn build(&self, reading: &ContinuousReading, switches: DiscreteChannelSet) -> Snapshot {
        let mut switches = switches;
        switches.set(
            DiscreteChannel::Continuity,
            continuity_from_raw(reading.continuity_raw()),
        );

        if self.interlock_engaged(&switches) {
            for channel in DiscreteChannel::SWITCHES {
                switches.set(channel, false);
            }
            switches.set(DiscreteChannel::LaunchKey, false);
        }

        Snapshot {
            timestamp: reading.timestamp(),
            telemetry: reading.values().to_vec(),
            switches,
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(true)
    }
}
