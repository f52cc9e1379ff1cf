//! Relay loop counters exposed to operators.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Point-in-time view of the relay loop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RelayStats {
    /// Whether the tick loop is currently running.
    pub running: bool,
    /// Ticks executed since the loop was created.
    pub ticks: u64,
    /// Snapshots handed to the broadcaster.
    pub broadcasts: u64,
    /// Ticks whose snapshot matched the last broadcast and was skipped.
    pub duplicates: u64,
    /// Ticks where the telemetry store returned no row.
    pub empty_polls: u64,
    /// Ticks where the telemetry store query failed.
    pub source_errors: u64,
    /// Timestamp (ms since epoch) of the last broadcast sample, if any.
    pub last_timestamp_ms: Option<i64>,
}

impl RelayStats {
    /// Share of evaluated snapshots that were actually broadcast, in
    /// percent. `100.0` before anything has been evaluated.
    #[allow(clippy::cast_precision_loss)]
    pub fn efficiency_percent(&self) -> f64 {
        let evaluated = self.broadcasts.saturating_add(self.duplicates);
        if evaluated == 0 {
            return 100.0;
        }
        // Counters stay far below 2^52 for any realistic run.
        (self.broadcasts as f64 / evaluated as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efficiency_defaults_to_full() {
        let stats = RelayStats::default();
        assert!((stats.efficiency_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn efficiency_counts_duplicates() {
        let stats = RelayStats {
            broadcasts: 1,
            duplicates: 3,
            ..RelayStats::default()
        };
        assert!((stats.efficiency_percent() - 25.0).abs() < 1e-9);
    }
}
