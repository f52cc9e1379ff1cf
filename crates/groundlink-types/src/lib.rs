//! Shared type definitions for the Groundlink telemetry relay.
//!
//! This crate is the single source of truth for the data that crosses
//! component boundaries: discrete switch state, continuous sensor readings
//! and the snapshot broadcast to dashboards. Wire types flow downstream to
//! `TypeScript` via `ts-rs` for the dashboard frontend.
//!
//! # Modules
//!
//! - [`channels`] -- Closed set of discrete channels and their state
//! - [`reading`] -- Continuous readings from the time-series store
//! - [`snapshot`] -- The broadcast unit and its wire format
//! - [`ids`] -- Type-safe UUID wrappers
//! - [`stats`] -- Relay counters for the status API

pub mod channels;
pub mod ids;
pub mod reading;
pub mod snapshot;
pub mod stats;

pub use channels::{DiscreteChannel, DiscreteChannelSet};
pub use ids::SubscriberId;
pub use reading::{ChannelValue, ContinuousReading};
pub use snapshot::Snapshot;
pub use stats::RelayStats;

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // Files are written to `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::channels::DiscreteChannelSet::export_all();
        let _ = crate::reading::ChannelValue::export_all();
        let _ = crate::snapshot::Snapshot::export_all();
        let _ = crate::ids::SubscriberId::export_all();
        let _ = crate::stats::RelayStats::export_all();
    }
}
