//! Audit log routes (read-only).

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use ragvault_db::entities::audit_logs;
use ragvault_db::{AuditLogRepository, TenantConnection};
use ragvault_shared::Role;
use ragvault_shared::types::{PageRequest, PageResponse};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;

/// Creates the audit log router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/audit-logs", get(list_audit_logs))
}

/// Audit event as returned to clients.
#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    /// Event id.
    pub id: Uuid,
    /// Acting user.
    pub user_id: Option<Uuid>,
    /// Dotted action name.
    pub action: String,
    /// Affected resource.
    pub resource: Option<String>,
    /// Details.
    pub metadata: Option<Value>,
    /// Outcome.
    pub success: bool,
    /// Client address.
    pub ip_address: Option<String>,
    /// Time of the event.
    pub created_at: DateTime<Utc>,
}

impl From<audit_logs::Model> for AuditLogResponse {
    fn from(model: audit_logs::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            action: model.action,
            resource: model.resource,
            metadata: model.metadata,
            success: model.success,
            ip_address: model.ip_address,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// GET /audit-logs - Tenant audit trail, newest first (admin+).
async fn list_audit_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<PageResponse<AuditLogResponse>>> {
    auth.require(Role::Admin)?;
    let page = page.normalized();

    let conn = TenantConnection::new(&state.db, auth.tenant_id()).await?;
    let (rows, total) = AuditLogRepository::new(&conn)
        .list(page.clone())
        .await
        .map_err(|e| ApiError::database(&e))?;
    conn.commit().await.map_err(|e| ApiError::database(&e))?;

    let data = rows.into_iter().map(AuditLogResponse::from).collect();
    Ok(Json(PageResponse::new(data, page.page, page.per_page, total)))
}
