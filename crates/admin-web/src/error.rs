//! Error types for the admin API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use synchronizer::SyncError;
use thiserror::Error;

/// Errors returned by admin handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Sync(#[from] SyncError),

    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Database(err) | ApiError::Sync(SyncError::Database(err)) => database_status(err),
            ApiError::Sync(SyncError::Upstream { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Sync(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn database_status(err: &DatabaseError) -> StatusCode {
    match err {
        DatabaseError::NotFound { .. } | DatabaseError::NoMatchingRecord { .. } => StatusCode::NOT_FOUND,
        DatabaseError::AlreadyExists { .. } => StatusCode::CONFLICT,
        DatabaseError::InvalidIdentifier { .. } | DatabaseError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
        DatabaseError::ConnectionLost(_) => StatusCode::SERVICE_UNAVAILABLE,
        DatabaseError::Sqlx(_) | DatabaseError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        // Internal details stay in the log
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "status": "error",
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for admin handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
