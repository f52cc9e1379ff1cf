//! Switch state, snapshot merge, change filter, and the fixed-rate relay
//! loop for Groundlink.
//!
//! This crate owns the per-tick pipeline that turns discrete operator
//! events and continuous sensor readings into deduplicated snapshots:
//! discrete drain, telemetry fetch, merge, filter, publish.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `groundlink-config.yaml` into
//!   strongly-typed structs.
//! - [`control`] -- [`RelayControl`] shared run flags and counters.
//! - [`discrete`] -- [`DiscreteEventSource`] trait and the named-pipe
//!   reader.
//! - [`filter`] -- Change filter suppressing redundant snapshots.
//! - [`scheduler`] -- [`Scheduler`] and the tick loop.
//! - [`snapshot`] -- Snapshot builder with continuity and abort overrides.
//! - [`source`] -- [`TelemetrySource`] trait and [`StubTelemetrySource`].
//! - [`switch_state`] -- Event grammar and the shared switch state store.
//! - [`timing`] -- Drift-corrected delay and achieved-rate metering.
//!
//! [`RelayControl`]: control::RelayControl
//! [`DiscreteEventSource`]: discrete::DiscreteEventSource
//! [`Scheduler`]: scheduler::Scheduler
//! [`TelemetrySource`]: source::TelemetrySource
//! [`StubTelemetrySource`]: source::StubTelemetrySource

pub mod config;
pub mod control;
pub mod discrete;
pub mod filter;
pub mod scheduler;
pub mod snapshot;
pub mod source;
pub mod switch_state;
pub mod timing;
