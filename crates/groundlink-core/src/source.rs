//! Telemetry source trait and stub implementation.
//!
//! Once per tick the relay loop asks a [`TelemetrySource`] for the latest
//! continuous reading. The trait abstracts the backing store -- in
//! production a time-series database, in tests a scripted stub.
//!
//! "No data yet" (`Ok(None)`) and "store unreachable" (`Err`) are both
//! normal operating conditions: the loop skips the tick's broadcast and
//! carries on.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use groundlink_types::ContinuousReading;

/// Errors a telemetry source can report for one poll.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The store could not be reached or the query failed.
    #[error("telemetry source unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// A row came back but could not be decoded into a reading.
    #[error("malformed telemetry row: {reason}")]
    Malformed {
        /// Description of the decode failure.
        reason: String,
    },
}

/// A source of continuous sensor readings.
pub trait TelemetrySource: Send {
    /// Fetch the latest reading.
    ///
    /// Returns `Ok(None)` when the store has no data yet.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if this poll failed. A failure affects only
    /// the current tick.
    fn fetch_latest(
        &mut self,
    ) -> impl Future<Output = Result<Option<ContinuousReading>, SourceError>> + Send;

    /// Release held resources (connections, handles). Called when the relay
    /// loop stops.
    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Shared counters for observing a [`StubTelemetrySource`] after it has
/// been moved into the relay loop.
#[derive(Debug, Clone, Default)]
pub struct StubProbe {
    fetches: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl StubProbe {
    /// Number of `fetch_latest` calls so far.
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Acquire)
    }

    /// Whether `close` has been called.
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A scripted telemetry source.
///
/// Outcomes are returned in the order they were queued. Once the script is
/// exhausted the last reading returned is repeated, the way a "latest row"
/// query keeps returning the same row while nothing new is ingested.
#[derive(Debug, Default)]
pub struct StubTelemetrySource {
    script: VecDeque<Result<Option<ContinuousReading>, SourceError>>,
    last: Option<ContinuousReading>,
    probe: StubProbe,
}

impl StubTelemetrySource {
    /// Create a stub with an empty script (it reports "no data").
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reading.
    #[must_use]
    pub fn with_reading(mut self, reading: ContinuousReading) -> Self {
        self.script.push_back(Ok(Some(reading)));
        self
    }

    /// Queue a "no data" poll.
    #[must_use]
    pub fn with_empty(mut self) -> Self {
        self.script.push_back(Ok(None));
        self
    }

    /// Queue a failing poll.
    #[must_use]
    pub fn with_error(mut self, error: SourceError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    /// Handle for observing the stub after it has been moved.
    pub fn probe(&self) -> StubProbe {
        self.probe.clone()
    }

    fn next_outcome(&mut self) -> Result<Option<ContinuousReading>, SourceError> {
        self.probe.fetches.fetch_add(1, Ordering::AcqRel);
        match self.script.pop_front() {
            Some(Ok(Some(reading))) => {
                self.last = Some(reading.clone());
                Ok(Some(reading))
            }
            Some(other) => other,
            None => Ok(self.last.clone()),
        }
    }
}

impl TelemetrySource for StubTelemetrySource {
    fn fetch_latest(
        &mut self,
    ) -> impl Future<Output = Result<Option<ContinuousReading>, SourceError>> + Send {
        let outcome = self.next_outcome();
        async move { outcome }
    }

    fn close(&mut self) -> impl Future<Output = ()> + Send {
        self.probe.closed.store(true, Ordering::Release);
        async {}
    }
}
