//! `SeaORM` entities.

pub mod prelude;

pub mod audit_logs;
pub mod chunks;
pub mod documents;
pub mod refresh_tokens;
pub mod sea_orm_active_enums;
pub mod tenants;
pub mod users;
