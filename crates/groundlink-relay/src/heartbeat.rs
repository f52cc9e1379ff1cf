//! Periodic operator-facing summary of relay activity.

use std::sync::Arc;
use std::time::Duration;

use groundlink_core::control::RelayControl;
use groundlink_observer::ConnectionRegistry;
use groundlink_types::RelayStats;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Activity between two heartbeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Window {
    broadcasts: u64,
    skipped: u64,
    source_errors: u64,
}

impl Window {
    const fn between(earlier: &RelayStats, later: &RelayStats) -> Self {
        Self {
            broadcasts: later.broadcasts.saturating_sub(earlier.broadcasts),
            skipped: later.duplicates.saturating_sub(earlier.duplicates),
            source_errors: later.source_errors.saturating_sub(earlier.source_errors),
        }
    }
}

/// Log a summary line every `period` until the task is aborted.
///
/// Returns `None` when `period` is zero.
pub fn spawn_heartbeat(
    period: Duration,
    control: Arc<RelayControl>,
    registry: Arc<ConnectionRegistry>,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        let mut previous = control.stats();
        loop {
            interval.tick().await;
            let current = control.stats();
            let window = Window::between(&previous, &current);
            info!(
                broadcasts = window.broadcasts,
                skipped = window.skipped,
                source_errors = window.source_errors,
                efficiency_percent = current.efficiency_percent(),
                subscribers = registry.len(),
                "Relay heartbeat"
            );
            previous = current;
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_counts_only_new_activity() {
        let earlier = RelayStats {
            broadcasts: 10,
            duplicates: 50,
            source_errors: 1,
            ..RelayStats::default()
        };
        let later = RelayStats {
            broadcasts: 25,
            duplicates: 80,
            source_errors: 1,
            ..RelayStats::default()
        };
        assert_eq!(
            Window::between(&earlier, &later),
            Window {
                broadcasts: 15,
                skipped: 30,
                source_errors: 0,
            }
        );
    }

    #[tokio::test]
    async fn zero_period_disables_heartbeat() {
        let handle = spawn_heartbeat(
            Duration::ZERO,
            Arc::new(RelayControl::new()),
            Arc::new(ConnectionRegistry::default()),
        );
        assert!(handle.is_none());
    }
}
