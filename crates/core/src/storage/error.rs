//! Storage error types.

use ragvault_shared::AppError;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object not found.
    #[error("object not found: {key}")]
    NotFound {
        /// Key that was not found.
        key: String,
    },

    /// Key is empty, absolute, or would escape the tenant prefix.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// OpenDAL operation error.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid key error.
    #[must_use]
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: err.to_string(),
            },
            _ => Self::Operation(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound("object not found".into()),
            StorageError::InvalidKey(msg) => Self::Validation(msg),
            StorageError::Configuration(msg) | StorageError::Operation(msg) => {
                Self::ExternalService(msg)
            }
        }
    }
}
