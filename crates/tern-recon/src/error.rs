//! Error types for the reconciliation engine.
//!
//! The taxonomy follows the report lifecycle: invalid requests fail before
//! any state is persisted; fetch aborts and everything else fail the report
//! as a whole and are recorded once, at the orchestrator boundary.

use std::time::Duration;

use tern_core::ReportStatus;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconError>;

/// Errors that can occur while generating a reconciliation report.
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// The request was malformed; rejected before any work started.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What made the request invalid.
        message: String,
    },

    /// A cursor's page fetch could not be completed, after retries if any
    /// were configured.
    #[error("fetch aborted after {attempts} attempt(s): {message}")]
    FetchAbort {
        /// Description of the final failure.
        message: String,
        /// How many fetch attempts were made.
        attempts: u32,
    },

    /// Persisting or reading report state failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Report document serialization failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An illegal report lifecycle transition was attempted.
    #[error("invalid report transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: ReportStatus,
        /// Attempted target status.
        to: ReportStatus,
    },

    /// The run exceeded its wall-clock budget.
    #[error("report generation exceeded its time budget of {budget:?}")]
    Timeout {
        /// The configured budget.
        budget: Duration,
    },

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl ReconError {
    /// Creates an invalid-request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for errors that reject the request before any report
    /// state exists.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. })
    }
}

impl From<tern_core::Error> for ReconError {
    fn from(err: tern_core::Error) -> Self {
        match err {
            tern_core::Error::InvalidInput(message) => Self::InvalidRequest { message },
            tern_core::Error::NotFound(message) => Self::Storage {
                message: format!("not found: {message}"),
            },
            tern_core::Error::Storage { message, source } => Self::Storage {
                message: match source {
                    Some(cause) => format!("{message}: {cause}"),
                    None => message,
                },
            },
            tern_core::Error::Serialization { message } => Self::Serialization { message },
            tern_core::Error::Internal { message } => Self::Internal { message },
        }
    }
}
