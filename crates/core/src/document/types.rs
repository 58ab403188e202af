//! Document status and content kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DocumentError;

/// Processing status of a document.
///
/// `pending -> processing -> ready | failed`, and any non-deleted status may
/// move to `deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Stored, waiting for ingestion.
    Pending,
    /// Being chunked and embedded.
    Processing,
    /// Searchable.
    Ready,
    /// Ingestion failed; see the error message.
    Failed,
    /// Soft-deleted.
    Deleted,
}

impl DocumentStatus {
    /// Convert to database string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "failed" => Some(Self::Failed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether `self -> next` is a permitted transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Ready | Self::Failed)
                | (
                    Self::Pending | Self::Processing | Self::Ready | Self::Failed,
                    Self::Deleted
                )
        )
    }

    /// Statuses from which no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated status change, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// New status.
    pub status: DocumentStatus,
    /// Error message; only ever set for `failed`.
    pub error_message: Option<String>,
}

impl StatusUpdate {
    /// Validates `from -> to`. The error message is kept only when moving to
    /// `failed` and cleared otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidTransition`] for a forbidden move.
    pub fn new(from: DocumentStatus, to: DocumentStatus, error: Option<String>) -> Result<Self, DocumentError> {
        if !from.can_transition_to(to) {
            return Err(DocumentError::InvalidTransition { from, to });
        }
        let error_message = if to == DocumentStatus::Failed {
            Some(error.unwrap_or_else(|| "ingestion failed".to_string()))
        } else {
            None
        };
        Ok(Self {
            status: to,
            error_message,
        })
    }
}

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// PDF.
    Pdf,
    /// Office Open XML word processing.
    Docx,
    /// Legacy Word (OLE2).
    Doc,
    /// Plain text.
    Text,
    /// Markdown.
    Markdown,
}

impl DocumentKind {
    /// MIME type recorded for this kind.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Doc => "application/msword",
            Self::Text => "text/plain",
            Self::Markdown => "text/markdown",
        }
    }

    /// Canonical extension including the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
            Self::Doc => ".doc",
            Self::Text => ".txt",
            Self::Markdown => ".md",
        }
    }

    /// Kind for an allowed extension (lowercase, with the dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".pdf" => Some(Self::Pdf),
            ".docx" => Some(Self::Docx),
            ".doc" => Some(Self::Doc),
            ".txt" => Some(Self::Text),
            ".md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Audit actions recorded around document operations.
pub mod audit_action {
    /// Upload received, before validation against existing documents.
    pub const UPLOAD_ATTEMPT: &str = "document.upload_attempt";
    /// Upload refused because the tenant already has the same content.
    pub const DUPLICATE_REJECTED: &str = "document.duplicate_rejected";
    /// Upload stored and recorded.
    pub const UPLOADED: &str = "document.uploaded";
    /// Upload failed after validation.
    pub const UPLOAD_FAILED: &str = "document.upload_failed";
    /// Document soft-deleted.
    pub const DELETED: &str = "document.deleted";
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    use super::DocumentStatus::{Deleted, Failed, Pending, Processing, Ready};

    #[rstest]
    #[case(Pending, Processing, true)]
    #[case(Processing, Ready, true)]
    #[case(Processing, Failed, true)]
    #[case(Pending, Deleted, true)]
    #[case(Ready, Deleted, true)]
    #[case(Failed, Deleted, true)]
    #[case(Pending, Ready, false)]
    #[case(Ready, Processing, false)]
    #[case(Failed, Ready, false)]
    #[case(Deleted, Pending, false)]
    #[case(Deleted, Deleted, false)]
    #[case(Ready, Ready, false)]
    fn test_status_transitions(#[case] from: DocumentStatus, #[case] to: DocumentStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_error_message_only_on_failed() {
        let failed = StatusUpdate::new(Processing, Failed, Some("parser crashed".into())).unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("parser crashed"));

        let ready = StatusUpdate::new(Processing, Ready, Some("ignored".into())).unwrap();
        assert!(ready.error_message.is_none());

        let deleted = StatusUpdate::new(Failed, Deleted, None).unwrap();
        assert!(deleted.error_message.is_none());
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = StatusUpdate::new(Deleted, Ready, None).unwrap_err();
        assert_eq!(err, DocumentError::InvalidTransition { from: Deleted, to: Ready });
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [Pending, Processing, Ready, Failed, Deleted] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("archived"), None);
        assert!(Deleted.is_terminal());
    }

    #[test]
    fn test_kind_extensions() {
        for kind in [DocumentKind::Pdf, DocumentKind::Docx, DocumentKind::Doc, DocumentKind::Text, DocumentKind::Markdown] {
            assert_eq!(DocumentKind::from_extension(kind.extension()), Some(kind));
        }
        assert_eq!(DocumentKind::from_extension(".exe"), None);
    }
}
