//! Row-Level Security (RLS) tenant binding.
//!
//! Every tenant-scoped table carries a `tenant_isolation` policy comparing
//! `tenant_id` with the transaction-local setting `app.current_tenant_id`.
//! [`TenantConnection`] is the only way repositories reach those tables: it
//! opens a transaction and binds the tenant with a parameterised
//! `set_config(.., true)`, so the binding ends with the transaction.
//!
//! # Usage
//!
//! ```ignore
//! use ragvault_db::rls::TenantConnection;
//!
//! let conn = TenantConnection::new(&db, tenant_id).await?;
//! let docs = DocumentRepository::list(&conn, page).await?;
//! conn.commit().await?;
//! ```
//!
//! Dropping a `TenantConnection` without committing rolls the transaction
//! back, which also discards the binding. The pool additionally runs
//! [`RESET_TENANT_SQL`] whenever a connection is released.

use ragvault_shared::types::TenantId;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, Statement,
    TransactionTrait,
};
use tracing::debug;

use crate::error::RlsError;

/// Name of the PostgreSQL setting read by the isolation policies.
pub const TENANT_SETTING: &str = "app.current_tenant_id";

/// Clears any session-level tenant binding.
pub const RESET_TENANT_SQL: &str = "RESET app.current_tenant_id";

const BIND_TENANT_SQL: &str = "SELECT set_config('app.current_tenant_id', $1, true)";

const CURRENT_TENANT_SQL: &str =
    "SELECT NULLIF(current_setting('app.current_tenant_id', true), '') AS tenant_id";

/// A transaction bound to one tenant.
///
/// Queries issued through [`TenantConnection::transaction`] only see and only
/// write rows of the bound tenant. Rows of other tenants are invisible rather
/// than forbidden: reads come back empty and writes affect zero rows.
pub struct TenantConnection {
    txn: DatabaseTransaction,
    tenant_id: TenantId,
}

impl std::fmt::Debug for TenantConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConnection")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl TenantConnection {
    /// Validates an untrusted tenant identifier and binds it.
    ///
    /// Existence of the tenant is not checked: an unknown tenant simply sees
    /// no rows.
    ///
    /// # Errors
    ///
    /// Returns [`RlsError::InvalidTenant`] for a malformed or nil identifier,
    /// without opening a transaction.
    pub async fn bind(db: &DatabaseConnection, raw: &str) -> Result<Self, RlsError> {
        let tenant_id = TenantId::parse(raw)?;
        Self::new(db, tenant_id).await
    }

    /// Begins a transaction and binds `tenant_id` to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the setting
    /// cannot be applied.
    pub async fn new(db: &DatabaseConnection, tenant_id: TenantId) -> Result<Self, RlsError> {
        let txn = db.begin().await?;
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            BIND_TENANT_SQL,
            [tenant_id.to_string().into()],
        ))
        .await?;
        debug!(tenant_id = %tenant_id, "tenant bound");
        Ok(Self { txn, tenant_id })
    }

    /// The bound tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the underlying transaction for executing queries.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits the transaction and ends the binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction and ends the binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Extension trait for `DatabaseConnection` to open tenant-bound transactions.
#[async_trait::async_trait]
pub trait TenantExt {
    /// Opens a transaction bound to `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding cannot be established.
    async fn for_tenant(&self, tenant_id: TenantId) -> Result<TenantConnection, RlsError>;
}

#[async_trait::async_trait]
impl TenantExt for DatabaseConnection {
    async fn for_tenant(&self, tenant_id: TenantId) -> Result<TenantConnection, RlsError> {
        TenantConnection::new(self, tenant_id).await
    }
}

/// Reads the tenant binding visible on `conn`, `None` when unbound.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn current_tenant_setting<C: ConnectionTrait>(conn: &C) -> Result<Option<String>, DbErr> {
    let row = conn
        .query_one(Statement::from_string(DbBackend::Postgres, CURRENT_TENANT_SQL))
        .await?;
    match row {
        Some(row) => row.try_get::<Option<String>>("", "tenant_id"),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_statement_is_parameterised() {
        assert!(BIND_TENANT_SQL.contains("$1"));
        assert!(BIND_TENANT_SQL.contains(TENANT_SETTING));
        assert!(BIND_TENANT_SQL.ends_with("true)"));
    }

    #[test]
    fn test_reset_targets_the_policy_setting() {
        assert_eq!(RESET_TENANT_SQL, format!("RESET {TENANT_SETTING}"));
        assert!(CURRENT_TENANT_SQL.contains(TENANT_SETTING));
    }

    #[tokio::test]
    async fn test_bind_rejects_malformed_tenant_before_connecting() {
        let db = DatabaseConnection::default();
        for raw in ["", "not-a-uuid", " 550e8400-e29b-41d4-a716-446655440000", "00000000-0000-0000-0000-000000000000"] {
            let err = TenantConnection::bind(&db, raw).await.unwrap_err();
            assert!(matches!(err, RlsError::InvalidTenant(_)), "{raw:?}: {err}");
        }
    }
}
