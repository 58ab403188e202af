//! Application-wide error types.

use thiserror::Error;

use crate::types::id::TenantIdError;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// External message for every authentication failure.
pub const UNAUTHORIZED_MESSAGE: &str = "Authentication required";

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication failed. The detail is for logs only.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Authenticated, but the role is insufficient.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found (a row of another tenant is indistinguishable).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tenant identifier is not a well-formed, non-nil UUID.
    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),

    /// Attempt to modify or delete an append-only audit record.
    #[error("Immutability violation: {0}")]
    ImmutabilityViolation(String),

    /// A rotated refresh token was presented again.
    #[error("Refresh token reuse detected: {0}")]
    RefreshReuseDetected(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict (e.g., duplicate document).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload exceeds the configured limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// External service error.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) | Self::RefreshReuseDetected(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::InvalidTenant(_) | Self::Validation(_) => 400,
            Self::ImmutabilityViolation(_) | Self::Conflict(_) => 409,
            Self::PayloadTooLarge(_) => 413,
            Self::Database(_) | Self::ExternalService(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    ///
    /// Reuse detection reports the same code as any other authentication failure.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) | Self::RefreshReuseDetected(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidTenant(_) => "INVALID_TENANT",
            Self::ImmutabilityViolation(_) => "IMMUTABILITY_VIOLATION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to clients.
    ///
    /// Authentication failures and server-side errors never reveal their detail.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(_) | Self::RefreshReuseDetected(_) => UNAUTHORIZED_MESSAGE.to_string(),
            Self::Database(_) | Self::ExternalService(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::InvalidTenant(msg)
            | Self::ImmutabilityViolation(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg)
            | Self::PayloadTooLarge(msg) => msg.clone(),
        }
    }
}

impl From<TenantIdError> for AppError {
    fn from(err: TenantIdError) -> Self {
        Self::InvalidTenant(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
