//! Fixed-rate relay loop.
//!
//! [`TickLoop`] owns everything one tick touches: the discrete input, the
//! telemetry source, the snapshot builder and the last-broadcast state.
//! [`Scheduler`] moves it into a spawned task on [`start`](Scheduler::start)
//! and takes it back on [`stop`](Scheduler::stop), so a stopped relay can be
//! started again without rebuilding its parts.
//!
//! # Tick sequence
//!
//! 1. Drain pending discrete events into the [`SwitchStateStore`].
//! 2. Fetch the latest continuous reading. No data, or a failed poll, ends
//!    the tick without a broadcast.
//! 3. Merge reading and switch state into a [`Snapshot`].
//! 4. If it differs from the last broadcast, hand it to the
//!    [`SnapshotSink`].
//! 5. Sleep for the remainder of the target period.
//!
//! Exactly one tick is in flight at a time. A stop request takes effect
//! before the next tick; the current one always completes.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use groundlink_types::{DiscreteChannelSet, Snapshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::config::GroundlinkConfig;
use crate::control::{RelayControl, RelayEndReason};
use crate::discrete::DiscreteEventSource;
use crate::filter::{LastBroadcastState, should_broadcast};
use crate::snapshot::SnapshotBuilder;
use crate::source::{SourceError, TelemetrySource};
use crate::switch_state::SwitchStateStore;
use crate::timing::{TickRateMeter, next_delay};

/// Consecutive source failures between repeated warnings.
const SOURCE_ERROR_LOG_EVERY: u64 = 300;

/// Receives every snapshot that passes the change filter.
///
/// Implementations must not block: `publish` is called from inside the tick.
pub trait SnapshotSink: Send + Sync {
    /// Deliver `snapshot`. Returns the number of subscribers it reached.
    fn publish(&self, snapshot: &Snapshot) -> usize;
}

/// Errors that end a relay run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The tick counter cannot be incremented further.
    #[error("tick counter overflow after tick {tick}")]
    TickOverflow {
        /// The last tick number reached.
        tick: u64,
    },

    /// The next tick deadline is not representable.
    #[error("tick deadline overflow (delay {delay:?})")]
    DeadlineOverflow {
        /// The delay that could not be added to the current instant.
        delay: Duration,
    },

    /// The loop task panicked or was cancelled; its parts are lost.
    #[error("relay task failed: {reason}")]
    TaskFailed {
        /// Description from the join error.
        reason: String,
    },

    /// A previous run failed and the loop cannot be restarted.
    #[error("relay loop is unavailable after a failed run")]
    Unavailable,
}

/// Per-loop settings derived from configuration.
#[derive(Debug, Clone, Copy)]
pub struct TickSettings {
    /// Target period between tick starts.
    pub period: Duration,
    /// Ticks per achieved-rate report (0 disables).
    pub rate_report_ticks: u64,
    /// Whether an engaged abort masks the firing channels.
    pub abort_forces_safe: bool,
}

impl TickSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &GroundlinkConfig) -> Self {
        Self {
            period: config.relay.target_period(),
            rate_report_ticks: config.relay.rate_report_ticks,
            abort_forces_safe: config.interlock.abort_forces_safe,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A snapshot was handed to the sink.
    Broadcast {
        /// Subscribers reached.
        delivered: usize,
    },
    /// The snapshot matched the last broadcast.
    Duplicate,
    /// The source had no data.
    NoData,
    /// The poll failed; logged and skipped.
    SourceFailed,
}

/// The state one relay run works on.
pub struct TickLoop<S> {
    source: S,
    discrete: Box<dyn DiscreteEventSource>,
    store: Arc<SwitchStateStore>,
    sink: Arc<dyn SnapshotSink>,
    control: Arc<RelayControl>,
    builder: SnapshotBuilder,
    last: LastBroadcastState,
    meter: TickRateMeter,
    period: Duration,
    tick: u64,
    interlock_engaged: bool,
    source_error_streak: u64,
}

impl<S: TelemetrySource> TickLoop<S> {
    /// Assemble a loop from its parts.
    pub fn new(
        source: S,
        discrete: Box<dyn DiscreteEventSource>,
        store: Arc<SwitchStateStore>,
        sink: Arc<dyn SnapshotSink>,
        control: Arc<RelayControl>,
        settings: TickSettings,
    ) -> Self {
        Self {
            source,
            discrete,
            store,
            sink,
            control,
            builder: SnapshotBuilder::new(settings.abort_forces_safe),
            last: LastBroadcastState::new(),
            meter: TickRateMeter::new(settings.rate_report_ticks),
            period: settings.period,
            tick: 0,
            interlock_engaged: false,
            source_error_streak: 0,
        }
    }

    /// Number of ticks executed so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Last-broadcast state, including dedup counters.
    pub const fn last_broadcast(&self) -> &LastBroadcastState {
        &self.last
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TickOverflow`] when the tick counter is
    /// exhausted. Source and input failures are contained in the tick.
    pub async fn tick_once(&mut self) -> Result<TickOutcome, SchedulerError> {
        self.tick = self
            .tick
            .checked_add(1)
            .ok_or(SchedulerError::TickOverflow { tick: self.tick })?;
        self.control.record_tick();

        if let Err(e) = self.discrete.drain_into(&self.store) {
            warn!(tick = self.tick, error = %e, "Discrete input failed, continuing");
        }

        let reading = match self.source.fetch_latest().await {
            Ok(Some(reading)) => {
                self.note_source_recovered();
                reading
            }
            Ok(None) => {
                self.note_source_recovered();
                self.control.record_empty_poll();
                return Ok(TickOutcome::NoData);
            }
            Err(e) => {
                self.note_source_error(&e);
                return Ok(TickOutcome::SourceFailed);
            }
        };

        let switches = self.store.current_state();
        self.note_interlock(&switches);
        let snapshot = self.builder.build(&reading, switches);

        if !should_broadcast(&snapshot, &self.last) {
            self.last.record_duplicate();
            self.control.record_duplicate();
            return Ok(TickOutcome::Duplicate);
        }

        let delivered = self.sink.publish(&snapshot);
        self.last.record_broadcast(&snapshot);
        self.control.record_broadcast(snapshot.timestamp);
        Ok(TickOutcome::Broadcast { delivered })
    }

    fn note_source_error(&mut self, e: &SourceError) {
        self.control.record_source_error();
        self.source_error_streak = self.source_error_streak.saturating_add(1);
        if self.source_error_streak == 1
            || self.source_error_streak.checked_rem(SOURCE_ERROR_LOG_EVERY) == Some(0)
        {
            warn!(
                tick = self.tick,
                consecutive = self.source_error_streak,
                error = %e,
                "Telemetry poll failed, skipping tick"
            );
        }
    }

    fn note_source_recovered(&mut self) {
        if self.source_error_streak > 0 {
            info!(
                tick = self.tick,
                failed_polls = self.source_error_streak,
                "Telemetry source recovered"
            );
            self.source_error_streak = 0;
        }
    }

    fn note_interlock(&mut self, switches: &DiscreteChannelSet) {
        let engaged = self.builder.interlock_engaged(switches);
        if engaged && !self.interlock_engaged {
            warn!(tick = self.tick, "ABORT engaged, firing channels forced safe");
        } else if !engaged && self.interlock_engaged {
            info!(tick = self.tick, "Abort released");
        }
        self.interlock_engaged = engaged;
    }

    /// Tick until a stop is requested or a fatal error occurs.
    async fn run_ticks(&mut self) -> Result<(), SchedulerError> {
        let control = Arc::clone(&self.control);
        self.meter.restart(Instant::now());
        info!(
            period_us = self.period.as_micros(),
            "Relay loop running"
        );

        loop {
            let stop = control.stop_signal();
            if control.is_stop_requested() {
                return Ok(());
            }

            let started = Instant::now();
            let outcome = self.tick_once().await?;
            debug!(tick = self.tick, ?outcome, "Tick complete");

            let now = Instant::now();
            if let Some(sample) = self.meter.record(now) {
                debug!(
                    ticks = sample.ticks,
                    rate_hz = sample.rate_hz(),
                    "Achieved tick rate"
                );
            }

            let delay = next_delay(self.period, now.saturating_duration_since(started));
            let wake = now
                .checked_add(delay)
                .ok_or(SchedulerError::DeadlineOverflow { delay })?;

            tokio::select! {
                () = sleep_until(wake) => {}
                () = stop => return Ok(()),
            }
        }
    }

    /// Task body: run, then release both inputs whatever the outcome.
    async fn run(mut self: Box<Self>) -> (Box<Self>, Result<(), SchedulerError>) {
        let result = self.run_ticks().await;

        self.discrete.close();
        self.source.close().await;

        match &result {
            Ok(()) => {
                info!(
                    ticks = self.tick,
                    broadcasts = self.last.broadcast_count(),
                    "Relay loop stopped"
                );
                self.control.mark_finished(RelayEndReason::Stopped);
            }
            Err(e) => {
                error!(tick = self.tick, error = %e, "Relay loop failed");
                self.control.mark_finished(RelayEndReason::Fatal {
                    reason: e.to_string(),
                });
            }
        }
        (self, result)
    }
}

impl<S> core::fmt::Debug for TickLoop<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TickLoop")
            .field("tick", &self.tick)
            .field("period", &self.period)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

type RunHandle<S> = JoinHandle<(Box<TickLoop<S>>, Result<(), SchedulerError>)>;

enum State<S> {
    Stopped(Box<TickLoop<S>>),
    Running(RunHandle<S>),
    Lost,
}

/// Owns a [`TickLoop`] and its run state: `Stopped -> Running -> Stopped`.
pub struct Scheduler<S> {
    state: State<S>,
    control: Arc<RelayControl>,
}

impl<S: TelemetrySource + 'static> Scheduler<S> {
    /// Wrap a loop in the `Stopped` state.
    pub fn new(tick_loop: TickLoop<S>) -> Self {
        let control = Arc::clone(&tick_loop.control);
        Self {
            state: State::Stopped(Box::new(tick_loop)),
            control,
        }
    }

    /// Shared control state of the wrapped loop.
    pub fn control(&self) -> Arc<RelayControl> {
        Arc::clone(&self.control)
    }

    /// Whether the loop task is running.
    pub fn is_running(&self) -> bool {
        match &self.state {
            State::Running(handle) => !handle.is_finished(),
            State::Stopped(_) | State::Lost => false,
        }
    }

    /// Start ticking. Calling `start` while running is a no-op.
    ///
    /// A run that already ended on its own (after a fatal error) is
    /// collected first and the loop is started again.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Unavailable`] if an earlier run lost the
    /// loop's parts.
    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        if let State::Running(handle) = &self.state {
            if !handle.is_finished() {
                debug!("Relay loop already running");
                return Ok(());
            }
            if let Err(e) = self.stop().await {
                warn!(error = %e, "Previous relay run ended with an error, restarting");
            }
        }

        match mem::replace(&mut self.state, State::Lost) {
            State::Stopped(tick_loop) => {
                self.control.mark_started();
                self.state = State::Running(tokio::spawn(tick_loop.run()));
                Ok(())
            }
            State::Running(handle) => {
                self.state = State::Running(handle);
                Ok(())
            }
            State::Lost => Err(SchedulerError::Unavailable),
        }
    }

    /// Stop ticking and wait for the in-flight tick to finish.
    ///
    /// Both inputs are closed before this returns. Stopping a stopped loop
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the run, if any. After a
    /// fatal error the loop is still back in `Stopped` and can be restarted
    /// unless the task itself panicked.
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        match mem::replace(&mut self.state, State::Lost) {
            State::Stopped(tick_loop) => {
                self.state = State::Stopped(tick_loop);
                Ok(())
            }
            State::Running(handle) => {
                self.control.request_stop();
                match handle.await {
                    Ok((tick_loop, result)) => {
                        self.state = State::Stopped(tick_loop);
                        result
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        self.control.mark_finished(RelayEndReason::Fatal {
                            reason: reason.clone(),
                        });
                        Err(SchedulerError::TaskFailed { reason })
                    }
                }
            }
            State::Lost => Err(SchedulerError::Unavailable),
        }
    }
}

impl<S> core::fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = match &self.state {
            State::Stopped(_) => "stopped",
            State::Running(_) => "running",
            State::Lost => "lost",
        };
        f.debug_struct("Scheduler")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}
