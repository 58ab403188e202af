//! Audit log repository.
//!
//! The table is append-only. [`AuditLogRepository::update_action`] and
//! [`AuditLogRepository::delete`] exist to surface the database's refusal as
//! [`RlsError::ImmutabilityViolation`]; they never succeed against a migrated
//! schema.

use chrono::Utc;
use ragvault_shared::types::{PageRequest, UserId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::entities::audit_logs;
use crate::error::{RlsError, is_insufficient_privilege};
use crate::rls::TenantConnection;

/// An audit event to record in the bound tenant.
#[derive(Debug, Clone, Default)]
pub struct NewAuditEntry {
    /// Acting user, if known.
    pub user_id: Option<UserId>,
    /// Dotted action name, e.g. `document.uploaded`.
    pub action: String,
    /// Affected resource, e.g. `document:<id>`.
    pub resource: Option<String>,
    /// Free-form details.
    pub metadata: Option<Value>,
    /// Outcome.
    pub success: bool,
    /// Client address.
    pub ip_address: Option<String>,
}

impl NewAuditEntry {
    /// A successful event.
    #[must_use]
    pub fn success(action: &str) -> Self {
        Self {
            action: action.to_string(),
            success: true,
            ..Self::default()
        }
    }

    /// A failed event.
    #[must_use]
    pub fn failure(action: &str) -> Self {
        Self {
            action: action.to_string(),
            success: false,
            ..Self::default()
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the affected resource.
    #[must_use]
    pub fn on(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets the details.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the client address.
    #[must_use]
    pub fn from_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

fn immutability(err: DbErr) -> RlsError {
    if is_insufficient_privilege(&err) {
        warn!(target: "ragvault::security", error = %err, "audit log mutation refused");
        RlsError::ImmutabilityViolation("audit_logs is append-only".to_string())
    } else {
        RlsError::Database(err)
    }
}

/// Audit log repository, scoped to one tenant.
#[derive(Debug, Clone, Copy)]
pub struct AuditLogRepository<'a> {
    conn: &'a TenantConnection,
}

impl<'a> AuditLogRepository<'a> {
    /// Creates a repository over a tenant-bound connection.
    #[must_use]
    pub const fn new(conn: &'a TenantConnection) -> Self {
        Self { conn }
    }

    /// Appends an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn append(&self, entry: NewAuditEntry) -> Result<audit_logs::Model, DbErr> {
        let record = audit_logs::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(self.conn.tenant_id().into_inner()),
            user_id: Set(entry.user_id.map(UserId::into_inner)),
            action: Set(entry.action),
            resource: Set(entry.resource),
            metadata: Set(entry.metadata),
            success: Set(entry.success),
            ip_address: Set(entry.ip_address),
            created_at: Set(Utc::now().into()),
        };
        record.insert(self.conn.transaction()).await
    }

    /// Lists events, newest first. Returns the page and the total.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, page: PageRequest) -> Result<(Vec<audit_logs::Model>, u64), DbErr> {
        let page = page.normalized();
        let total = audit_logs::Entity::find()
            .count(self.conn.transaction())
            .await?;
        let rows = audit_logs::Entity::find()
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(self.conn.transaction())
            .await?;
        Ok((rows, total))
    }

    /// Lists events with the given action, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_action(&self, action: &str) -> Result<Vec<audit_logs::Model>, DbErr> {
        audit_logs::Entity::find()
            .filter(audit_logs::Column::Action.eq(action))
            .order_by_desc(audit_logs::Column::CreatedAt)
            .all(self.conn.transaction())
            .await
    }

    /// Attempts to rewrite an event's action.
    ///
    /// # Errors
    ///
    /// Always fails with [`RlsError::ImmutabilityViolation`] against a
    /// migrated schema.
    pub async fn update_action(&self, id: Uuid, action: &str) -> Result<u64, RlsError> {
        let result = audit_logs::Entity::update_many()
            .col_expr(audit_logs::Column::Action, Expr::value(action))
            .filter(audit_logs::Column::Id.eq(id))
            .exec(self.conn.transaction())
            .await
            .map_err(immutability)?;
        Ok(result.rows_affected)
    }

    /// Attempts to delete an event.
    ///
    /// # Errors
    ///
    /// Always fails with [`RlsError::ImmutabilityViolation`] against a
    /// migrated schema.
    pub async fn delete(&self, id: Uuid) -> Result<u64, RlsError> {
        let result = audit_logs::Entity::delete_many()
            .filter(audit_logs::Column::Id.eq(id))
            .exec(self.conn.transaction())
            .await
            .map_err(immutability)?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_builder() {
        let user = UserId::new();
        let entry = NewAuditEntry::success("document.uploaded")
            .by(user)
            .on("document:1")
            .with_metadata(json!({"size": 3}))
            .from_ip(Some("10.0.0.1".into()));
        assert!(entry.success);
        assert_eq!(entry.action, "document.uploaded");
        assert_eq!(entry.user_id, Some(user));
        assert_eq!(entry.resource.as_deref(), Some("document:1"));
        assert_eq!(entry.metadata, Some(json!({"size": 3})));
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_failure_entry() {
        let entry = NewAuditEntry::failure("document.upload_failed");
        assert!(!entry.success);
        assert!(entry.user_id.is_none());
    }

    #[test]
    fn test_non_privilege_errors_pass_through() {
        let err = immutability(DbErr::Custom("boom".into()));
        assert!(matches!(err, RlsError::Database(_)));
    }
}
