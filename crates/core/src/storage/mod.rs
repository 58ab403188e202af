//! Tenant-scoped object storage using Apache OpenDAL.
//!
//! Vendor-agnostic backends:
//! - S3-compatible: AWS S3, MinIO, Cloudflare R2
//! - Local filesystem (development only)
//! - Memory (tests)
//!
//! # Layout
//!
//! ```text
//! tenants/<tenant_id>/documents/<document_id>.<ext>
//! └──── TenantStorage prefix ───┘
//! ```
//!
//! A [`TenantStorage`] only accepts keys relative to its tenant prefix and
//! rejects any key that could resolve outside it.

mod config;
mod error;
mod service;

pub use config::StorageProvider;
pub use error::StorageError;
pub use service::{ObjectMetadata, ObjectStore, TenantStorage, tenant_prefix};
