//! Synchronizer error types.

use database::DatabaseError;
use thiserror::Error;

/// Errors that abort a synchronization run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store failure.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Upstream data needed for the run could not be fetched.
    #[error("upstream fetch failed: {what}")]
    Upstream { what: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub(crate) fn upstream(what: impl Into<String>) -> Self {
        SyncError::Upstream { what: what.into() }
    }
}

/// Result type for synchronization runs.
pub type Result<T> = std::result::Result<T, SyncError>;
