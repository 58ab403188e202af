//! Storage configuration types.

use std::path::PathBuf;

use ragvault_shared::config::StorageSettings;
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Storage provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage. Credentials come from the standard AWS
    /// environment when not set explicitly.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Region.
        region: String,
        /// Custom endpoint (MinIO, R2).
        endpoint: Option<String>,
    },
    /// Local filesystem (development only).
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
    /// In-process memory (tests).
    Memory,
}

impl StorageProvider {
    /// Builds the provider from application settings.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] for an unknown backend or a
    /// missing S3 bucket.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        match settings.backend.as_str() {
            "s3" => Ok(Self::S3 {
                bucket: settings
                    .bucket
                    .clone()
                    .ok_or_else(|| StorageError::configuration("s3 backend requires a bucket"))?,
                region: settings.region.clone().unwrap_or_else(|| "us-east-1".to_string()),
                endpoint: settings.endpoint.clone(),
            }),
            "fs" | "local" => Ok(Self::LocalFs {
                root: PathBuf::from(&settings.root),
            }),
            "memory" => Ok(Self::Memory),
            other => Err(StorageError::configuration(format!(
                "unknown storage backend '{other}'"
            ))),
        }
    }

    /// Provider name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::LocalFs { .. } => "local",
            Self::Memory => "memory",
        }
    }
}
