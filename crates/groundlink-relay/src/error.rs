//! Error types for the relay binary.

/// Top-level error for the relay binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: groundlink_core::config::ConfigError,
    },

    /// The telemetry store could not be reached or is misconfigured.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: groundlink_db::DbError,
    },

    /// The observer server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: groundlink_observer::StartupError,
    },

    /// The relay loop ended with a fatal error.
    #[error("relay loop error: {source}")]
    Loop {
        /// The underlying scheduler error.
        #[from]
        source: groundlink_core::scheduler::SchedulerError,
    },
}
