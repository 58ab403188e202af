//! Document error types.

use ragvault_shared::AppError;
use thiserror::Error;

use super::types::DocumentStatus;

/// Document validation and lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// Upload was empty.
    #[error("file is empty")]
    EmptyFile,

    /// Upload exceeds the size cap.
    #[error("file too large: {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Actual size.
        size: u64,
        /// Allowed maximum.
        max: u64,
    },

    /// Extension is not on the allow-list.
    #[error("file extension '{0}' is not allowed")]
    ExtensionNotAllowed(String),

    /// Detected content type is not supported.
    #[error("content type '{0}' is not supported")]
    UnsupportedContent(String),

    /// Display name is empty or too long.
    #[error("invalid document name: {0}")]
    InvalidName(String),

    /// Metadata is not a JSON object.
    #[error("metadata must be a JSON object")]
    InvalidMetadata,

    /// Same content already exists in this tenant.
    #[error("document with checksum {checksum} already exists")]
    Duplicate {
        /// SHA-256 hex of the content.
        checksum: String,
    },

    /// Status transition not permitted.
    #[error("cannot move document from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: DocumentStatus,
        /// Requested status.
        to: DocumentStatus,
    },
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::FileTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            DocumentError::Duplicate { .. } | DocumentError::InvalidTransition { .. } => {
                Self::Conflict(err.to_string())
            }
            DocumentError::EmptyFile
            | DocumentError::ExtensionNotAllowed(_)
            | DocumentError::UnsupportedContent(_)
            | DocumentError::InvalidName(_)
            | DocumentError::InvalidMetadata => Self::Validation(err.to_string()),
        }
    }
}
