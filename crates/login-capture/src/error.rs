//! Error types for the capture endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    BadRequest(String),

    /// The link points at no known recipient.
    #[error("{0}")]
    NotFound(String),
}

impl CaptureError {
    fn status(&self) -> StatusCode {
        match self {
            CaptureError::Database(DatabaseError::NoMatchingRecord { .. }) | CaptureError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            CaptureError::Database(DatabaseError::InvalidIdentifier { .. }) | CaptureError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            CaptureError::Database(DatabaseError::ConnectionLost(_)) => StatusCode::SERVICE_UNAVAILABLE,
            CaptureError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CaptureError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Capture failed");
            "internal server error".to_string()
        } else {
            tracing::debug!(status = %status, error = %self, "Capture rejected");
            self.to_string()
        };

        let body = serde_json::json!({
            "status": "error",
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
