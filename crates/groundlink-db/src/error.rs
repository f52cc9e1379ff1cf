//! Error types for the QuestDB adapter.
//!
//! [`DbError`] wraps [`sqlx`] errors with the context the relay loop needs
//! to classify a failed poll. It converts into the loop's
//! [`SourceError`]: decode problems become `Malformed`, everything else
//! `Unavailable`.

use groundlink_core::source::SourceError;

/// Errors that can occur talking to the time-series store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A query or connection failed.
    #[error("QuestDB error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A column could not be decoded into the expected type.
    #[error("cannot decode column {column}: {reason}")]
    Decode {
        /// Column name.
        column: String,
        /// What went wrong.
        reason: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for SourceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Decode { .. } => Self::Malformed {
                reason: err.to_string(),
            },
            DbError::Postgres(_) | DbError::Config(_) => Self::Unavailable {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_malformed() {
        let err = DbError::Decode {
            column: String::from("pt1"),
            reason: String::from("expected a number"),
        };
        assert!(matches!(SourceError::from(err), SourceError::Malformed { .. }));
    }

    #[test]
    fn query_errors_are_unavailable() {
        let err = DbError::Postgres(sqlx::Error::PoolTimedOut);
        assert!(matches!(
            SourceError::from(err),
            SourceError::Unavailable { .. }
        ));
    }
}
