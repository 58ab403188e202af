//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - The connection pool, with the tenant binding reset on every release
//! - [`rls::TenantConnection`], the only way to reach tenant-scoped tables
//! - `SeaORM` entity definitions
//! - Repository abstractions for data access
//! - Database migrations, including the row-level security policies

pub mod entities;
pub mod error;
pub mod migration;
pub mod pool;
pub mod repositories;
pub mod rls;

pub use error::RlsError;
pub use pool::connect;
pub use repositories::{
    AuditLogRepository, ChunkRepository, DocumentRepository, PgUserDirectory,
    RefreshTokenRepository, TenantRepository, UserRepository,
};
pub use rls::TenantConnection;
