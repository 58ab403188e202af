//! API error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ragvault_db::error::database_error;
use ragvault_shared::AppError;
use sea_orm::DbErr;
use serde::Serialize;
use tracing::error;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorBody,
}

/// Code and client-safe message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error code for programmatic handling.
    pub code: &'static str,
    /// Human-readable message. Never carries authentication detail.
    pub message: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Shorthand for a 401.
    #[must_use]
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self(AppError::Unauthorized(detail.into()))
    }

    /// Classifies a database failure.
    #[must_use]
    pub fn database(err: &DbErr) -> Self {
        Self(database_error(err))
    }

    /// Shorthand for a 400.
    #[must_use]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self(AppError::Validation(detail.into()))
    }
}

impl<E> From<E> for ApiError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.0.error_code(),
                message: self.0.public_message(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
