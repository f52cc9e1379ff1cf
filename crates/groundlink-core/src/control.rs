//! Shared relay control state.
//!
//! [`RelayControl`] is shared through [`Arc`](std::sync::Arc) between the
//! tick loop task, the [`Scheduler`](crate::scheduler::Scheduler) handle,
//! the heartbeat task and the HTTP status handlers. Counters are atomics so
//! the tick loop never takes a lock on the hot path.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use groundlink_types::RelayStats;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// Sentinel for "no snapshot broadcast yet".
const NO_TIMESTAMP: i64 = i64::MIN;

/// Why the relay loop stopped running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEndReason {
    /// A stop was requested.
    Stopped,
    /// The loop hit a condition it cannot continue past.
    Fatal {
        /// Description of the condition.
        reason: String,
    },
}

/// Shared control and counter state for one relay loop.
#[derive(Debug)]
pub struct RelayControl {
    /// Whether the loop is currently running.
    running: AtomicBool,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes the loop out of its inter-tick sleep.
    stop_notify: Notify,

    /// Wakes tasks waiting for the loop to finish.
    finished_notify: Notify,

    /// When the current run started.
    started_at: Mutex<Option<DateTime<Utc>>>,

    /// Why the last run ended.
    end_reason: Mutex<Option<RelayEndReason>>,

    ticks: AtomicU64,
    broadcasts: AtomicU64,
    duplicates: AtomicU64,
    empty_polls: AtomicU64,
    source_errors: AtomicU64,
    last_timestamp_ms: AtomicI64,
}

impl RelayControl {
    /// Create control state for a loop that has not started.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            finished_notify: Notify::new(),
            started_at: Mutex::new(None),
            end_reason: Mutex::new(None),
            ticks: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            source_errors: AtomicU64::new(0),
            last_timestamp_ms: AtomicI64::new(NO_TIMESTAMP),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Mark the loop as running and clear any previous stop request.
    pub fn mark_started(&self) {
        self.stop_requested.store(false, Ordering::Release);
        *self.end_reason.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        self.running.store(true, Ordering::Release);
    }

    /// Record why the loop ended and wake everyone waiting on it.
    pub fn mark_finished(&self, reason: RelayEndReason) {
        *self.end_reason.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
        self.running.store(false, Ordering::Release);
        self.finished_notify.notify_waiters();
    }

    /// Whether the loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// When the current (or last) run started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Why the last run ended, if it has.
    pub fn end_reason(&self) -> Option<RelayEndReason> {
        self.end_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until the loop is no longer running, then return why it ended.
    ///
    /// Returns immediately if the loop is not running.
    pub async fn wait_finished(&self) -> Option<RelayEndReason> {
        loop {
            // Registered before the check so a finish in between is not lost.
            let finished = self.finished_notify.notified();
            if !self.is_running() {
                return self.end_reason();
            }
            finished.await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a stop. The in-flight tick completes; the pending sleep is
    /// cut short.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Future completing on the next [`request_stop`](Self::request_stop).
    ///
    /// Create it before checking [`is_stop_requested`](Self::is_stop_requested)
    /// so a request landing between the two is observed.
    pub fn stop_signal(&self) -> Notified<'_> {
        self.stop_notify.notified()
    }

    // -----------------------------------------------------------------------
    // Counters
    // -----------------------------------------------------------------------

    /// Count one tick.
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one broadcast snapshot.
    pub fn record_broadcast(&self, timestamp: DateTime<Utc>) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.last_timestamp_ms
            .store(timestamp.timestamp_millis(), Ordering::Relaxed);
    }

    /// Count one suppressed duplicate.
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one poll that returned no data.
    pub fn record_empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed poll.
    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn stats(&self) -> RelayStats {
        let last = self.last_timestamp_ms.load(Ordering::Relaxed);
        RelayStats {
            running: self.is_running(),
            ticks: self.ticks.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            last_timestamp_ms: (last != NO_TIMESTAMP).then_some(last),
        }
    }
}

impl Default for RelayControl {
    fn default() -> Self {
        Self::new()
    }
}
