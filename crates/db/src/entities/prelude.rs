//! Entity re-exports.

pub use super::audit_logs::Entity as AuditLogs;
pub use super::chunks::Entity as Chunks;
pub use super::documents::Entity as Documents;
pub use super::refresh_tokens::Entity as RefreshTokens;
pub use super::tenants::Entity as Tenants;
pub use super::users::Entity as Users;
