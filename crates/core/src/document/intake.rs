//! Upload validation.
//!
//! The client's filename and `Content-Type` are never trusted: the stored
//! name is sanitised to a safe basename and the content type comes from the
//! file's magic bytes (text formats, which have none, from the extension).

use ragvault_shared::types::{DocumentId, TenantId};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::DocumentError;
use super::types::DocumentKind;

/// Longest stored filename.
pub const MAX_FILENAME_LEN: usize = 200;
/// Longest display name.
pub const MAX_DOCUMENT_NAME_LEN: usize = 255;
/// Default upload cap: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const MAGIC_PDF: &[u8] = b"%PDF";
const MAGIC_ZIP: &[u8] = b"PK\x03\x04";
const MAGIC_OLE2: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1";

/// Upload constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeLimits {
    /// Maximum accepted size in bytes.
    pub max_bytes: u64,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// A validated upload, ready to be stored and recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDocument {
    /// New document id.
    pub document_id: DocumentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Sanitised original filename.
    pub filename: String,
    /// Trimmed display name.
    pub document_name: String,
    /// Detected format.
    pub kind: DocumentKind,
    /// SHA-256 hex of the content.
    pub checksum: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Object storage key under the tenant prefix.
    pub storage_key: String,
    /// Caller-supplied metadata object.
    pub metadata: Value,
}

/// Reduces a client filename to a safe basename.
///
/// Directory components are dropped, characters outside `[A-Za-z0-9._-]`
/// become `_`, and the result is capped at 200 characters.
#[must_use]
pub fn sanitize_filename(raw: &str) -> String {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let safe: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_LEN)
        .collect();
    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        safe
    }
}

/// Trims and checks a display name (1 to 255 characters, no control characters).
///
/// # Errors
///
/// Returns [`DocumentError::InvalidName`].
pub fn validate_document_name(raw: &str) -> Result<String, DocumentError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DocumentError::InvalidName("name is required".into()));
    }
    if name.chars().count() > MAX_DOCUMENT_NAME_LEN {
        return Err(DocumentError::InvalidName(format!(
            "name exceeds {MAX_DOCUMENT_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(DocumentError::InvalidName("name contains control characters".into()));
    }
    Ok(name.to_string())
}

fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

/// Detects the document kind from content, falling back to the extension for
/// text formats, and enforces the extension allow-list.
///
/// # Errors
///
/// Returns [`DocumentError::UnsupportedContent`] for unrecognised content and
/// [`DocumentError::ExtensionNotAllowed`] for a disallowed extension.
pub fn detect_kind(filename: &str, content: &[u8]) -> Result<DocumentKind, DocumentError> {
    let ext = extension(filename);

    let kind = if content.starts_with(MAGIC_PDF) {
        DocumentKind::Pdf
    } else if content.starts_with(MAGIC_ZIP) {
        DocumentKind::Docx
    } else if content.starts_with(MAGIC_OLE2) {
        DocumentKind::Doc
    } else {
        match ext.as_deref() {
            Some(".txt") if looks_like_text(content) => DocumentKind::Text,
            Some(".md") if looks_like_text(content) => DocumentKind::Markdown,
            _ => {
                return Err(DocumentError::UnsupportedContent(
                    "application/octet-stream".into(),
                ));
            }
        }
    };

    match ext {
        Some(ext) if DocumentKind::from_extension(&ext).is_some() => Ok(kind),
        Some(ext) => Err(DocumentError::ExtensionNotAllowed(ext)),
        None => Err(DocumentError::ExtensionNotAllowed(String::new())),
    }
}

fn looks_like_text(content: &[u8]) -> bool {
    let head = &content[..content.len().min(8192)];
    !head.contains(&0)
}

/// SHA-256 hex digest of the content.
#[must_use]
pub fn checksum(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Object key: `tenants/<tenant_id>/documents/<document_id><ext>`.
#[must_use]
pub fn document_storage_key(tenant: TenantId, document: DocumentId, kind: DocumentKind) -> String {
    format!("tenants/{tenant}/documents/{document}{}", kind.extension())
}

/// Validates an upload and derives everything needed to store it.
///
/// # Errors
///
/// Returns the first failed check as a [`DocumentError`].
pub fn prepare_upload(
    limits: IntakeLimits,
    tenant_id: TenantId,
    filename: &str,
    document_name: &str,
    metadata: Option<Value>,
    content: &[u8],
) -> Result<PreparedDocument, DocumentError> {
    let size_bytes = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if size_bytes == 0 {
        return Err(DocumentError::EmptyFile);
    }
    if size_bytes > limits.max_bytes {
        return Err(DocumentError::FileTooLarge {
            size: size_bytes,
            max: limits.max_bytes,
        });
    }

    let metadata = match metadata {
        None => Value::Object(serde_json::Map::new()),
        Some(value @ Value::Object(_)) => value,
        Some(_) => return Err(DocumentError::InvalidMetadata),
    };

    let filename = sanitize_filename(filename);
    let document_name = validate_document_name(document_name)?;
    let kind = detect_kind(&filename, content)?;
    let document_id = DocumentId::new();

    Ok(PreparedDocument {
        document_id,
        tenant_id,
        storage_key: document_storage_key(tenant_id, document_id, kind),
        filename,
        document_name,
        kind,
        checksum: checksum(content),
        size_bytes,
        metadata,
    })
}

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;
