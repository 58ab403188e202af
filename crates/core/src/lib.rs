//! Core logic for RagVault.
//!
//! This crate holds the authentication pipeline and the document intake rules.
//! It has no web framework or database dependencies; persistence is reached
//! through the traits in [`auth::store`], implemented by `ragvault-db`.
//!
//! # Modules
//!
//! - `auth` - JWKS key cache, token verification, first-party issuer, sessions
//! - `document` - Upload validation, checksums, status transitions
//! - `storage` - Tenant-prefixed object storage over OpenDAL
//! - `singleflight` - Coalescing of concurrent identical work

pub mod auth;
pub mod document;
pub mod singleflight;
pub mod storage;
