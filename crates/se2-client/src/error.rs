//! Error types for se2-client.

use thiserror::Error;

/// Errors that can occur when talking to the SE2 API.
#[derive(Debug, Error)]
pub enum Se2Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status other than an auth rejection.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Upstream rejected the session cookie.
    #[error("session expired (HTTP {0})")]
    AuthExpired(u16),

    /// Reading or writing the stored cookie failed.
    #[error("credential store error: {0}")]
    Credential(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No usable cookie was stored, or a refresh returned none.
    #[error("no session cookie available")]
    MissingCookie,
}
