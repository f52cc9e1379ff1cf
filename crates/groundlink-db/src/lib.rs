//! QuestDB telemetry source for the Groundlink relay.
//!
//! QuestDB ingests the test stand's sensor rows; the relay only reads. This
//! crate connects over QuestDB's `PostgreSQL` wire endpoint and implements
//! [`TelemetrySource`](groundlink_core::source::TelemetrySource) on top of
//! it.
//!
//! # Modules
//!
//! - [`questdb`] -- Connection pool and configuration
//! - [`telemetry_store`] -- Per-table latest-row and cursor queries
//! - [`error`] -- Shared error types

pub mod error;
pub mod questdb;
pub mod telemetry_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use questdb::{QuestDbConfig, QuestDbPool};
pub use telemetry_store::{QueryPlan, QuestDbSource, TableQuery};
