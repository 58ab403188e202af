//! Repository abstractions for data access.
//!
//! Repositories for tenant-scoped tables borrow a [`TenantConnection`] and
//! have no other constructor, so an unscoped query through them does not
//! compile. [`TenantRepository`] and [`RefreshTokenRepository`] work on the
//! pool directly: tenants are the scope itself and refresh tokens are looked
//! up before a tenant is known.
//!
//! [`TenantConnection`]: crate::rls::TenantConnection

pub mod audit_log;
pub mod chunk;
pub mod directory;
pub mod document;
pub mod refresh_token;
pub mod tenant;
pub mod user;

pub use audit_log::{AuditLogRepository, NewAuditEntry};
pub use chunk::{ChunkRepository, NewChunk};
pub use directory::PgUserDirectory;
pub use document::{DocumentRepoError, DocumentRepository};
pub use refresh_token::RefreshTokenRepository;
pub use tenant::{NewTenant, TenantError, TenantRepository, validate_slug};
pub use user::{NewUser, UserRepository};
