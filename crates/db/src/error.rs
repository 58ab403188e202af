//! Database error classification.
//!
//! PostgreSQL reports policy, privilege and trigger refusals through SQLSTATE
//! codes; these helpers turn the interesting ones into domain errors.

use ragvault_shared::AppError;
use ragvault_shared::types::id::TenantIdError;
use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

/// `insufficient_privilege`: raised by the audit trigger and by missing grants.
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Errors from tenant-bound connections and append-only tables.
#[derive(Debug, Error)]
pub enum RlsError {
    /// The tenant identifier was rejected before touching the database.
    #[error(transparent)]
    InvalidTenant(#[from] TenantIdError),

    /// The database refused to modify an append-only record.
    #[error("immutable record: {0}")]
    ImmutabilityViolation(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl From<RlsError> for AppError {
    fn from(err: RlsError) -> Self {
        match err {
            RlsError::InvalidTenant(e) => e.into(),
            RlsError::ImmutabilityViolation(msg) => Self::ImmutabilityViolation(msg),
            RlsError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Returns the SQLSTATE carried by a driver error, if any.
#[must_use]
pub fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e))
        | DbErr::Conn(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(std::borrow::Cow::into_owned),
        _ => None,
    }
}

/// True when the database refused the statement for lack of privilege.
#[must_use]
pub fn is_insufficient_privilege(err: &DbErr) -> bool {
    sqlstate(err).as_deref() == Some(INSUFFICIENT_PRIVILEGE)
}

/// True for a unique constraint violation.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    sqlstate(err).as_deref() == Some(UNIQUE_VIOLATION)
}

/// Converts a plain database error for the API boundary.
#[must_use]
pub fn database_error(err: &DbErr) -> AppError {
    AppError::Database(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_driver_errors_have_no_sqlstate() {
        let err = DbErr::RecordNotFound("documents".into());
        assert_eq!(sqlstate(&err), None);
        assert!(!is_unique_violation(&err));
        assert!(!is_insufficient_privilege(&err));
    }

    #[test]
    fn test_invalid_tenant_maps_to_400() {
        let app: AppError = RlsError::InvalidTenant(TenantIdError::Nil).into();
        assert_eq!(app.status_code(), 400);
        assert_eq!(app.error_code(), "INVALID_TENANT");
    }

    #[test]
    fn test_immutability_maps_to_409() {
        let app: AppError = RlsError::ImmutabilityViolation("audit_logs is append-only".into()).into();
        assert_eq!(app.status_code(), 409);
        assert_eq!(app.error_code(), "IMMUTABILITY_VIOLATION");
    }

    #[test]
    fn test_database_error_is_internal() {
        let app: AppError = RlsError::Database(DbErr::Custom("boom".into())).into();
        assert_eq!(app.status_code(), 500);
        assert_eq!(app.public_message(), "Internal server error");
    }
}
