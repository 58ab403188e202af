//! Document intake rules.
//!
//! Everything here is pure: it validates and describes an upload so the API
//! layer can store the bytes and insert the row inside a tenant-bound
//! transaction.

mod error;
mod intake;
mod types;

pub use error::DocumentError;
pub use intake::{
    IntakeLimits, PreparedDocument, checksum, detect_kind, document_storage_key, prepare_upload,
    sanitize_filename, validate_document_name,
};
pub use types::{DocumentKind, DocumentStatus, StatusUpdate, audit_action};
