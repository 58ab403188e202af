//! Document upload and management routes.
//!
//! Every handler runs inside a [`TenantConnection`] bound to the caller's
//! tenant, so the database only ever shows that tenant's documents.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ragvault_core::document::{DocumentError, DocumentStatus, audit_action, prepare_upload};
use ragvault_core::storage::TenantStorage;
use ragvault_db::entities::documents;
use ragvault_db::repositories::{
    AuditLogRepository, DocumentRepoError, DocumentRepository, NewAuditEntry,
};
use ragvault_db::{RlsError, TenantConnection};
use ragvault_shared::types::{DocumentId, PageRequest, PageResponse, TenantId, UserId};
use ragvault_shared::{AppError, Role};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::client_ip;
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;

/// Creates the document router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", post(upload_document).get(list_documents))
        .route("/documents/{id}", get(get_document).delete(delete_document))
}

/// Document as returned to clients. The storage key stays internal.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    /// Document id.
    pub id: Uuid,
    /// Display name.
    pub document_name: String,
    /// Sanitised original filename.
    pub filename: String,
    /// Detected MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// SHA-256 hex of the content.
    pub checksum: String,
    /// Processing status.
    pub status: DocumentStatus,
    /// Failure reason, only for `failed`.
    pub error_message: Option<String>,
    /// Chunks produced.
    pub chunk_count: i32,
    /// Vectors stored.
    pub vector_count: i32,
    /// Caller-supplied metadata.
    pub metadata: Value,
    /// Uploader.
    pub uploaded_by: Option<Uuid>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl From<documents::Model> for DocumentResponse {
    fn from(model: documents::Model) -> Self {
        Self {
            id: model.id,
            document_name: model.document_name,
            filename: model.filename,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            checksum: model.checksum,
            status: model.status.into(),
            error_message: model.error_message,
            chunk_count: model.chunk_count,
            vector_count: model.vector_count,
            metadata: model.metadata.unwrap_or_else(|| json!({})),
            uploaded_by: model.uploaded_by,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

/// Parsed multipart upload.
#[derive(Debug)]
struct UploadForm {
    filename: String,
    content: Bytes,
    document_name: String,
    metadata: Option<Value>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(AppError::PayloadTooLarge(err.body_text()))
    } else {
        ApiError::bad_request(err.body_text())
    }
}

impl UploadForm {
    /// Reads `file`, `document_name` and optional `metadata` fields.
    ///
    /// A missing `document_name` falls back to the uploaded filename.
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut file: Option<(String, Bytes)> = None;
        let mut document_name = None;
        let mut metadata = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("file") => {
                    let filename = field.file_name().unwrap_or_default().to_owned();
                    let content = field.bytes().await.map_err(multipart_error)?;
                    file = Some((filename, content));
                }
                Some("document_name") => {
                    document_name = Some(field.text().await.map_err(multipart_error)?);
                }
                Some("metadata") => {
                    let raw = field.text().await.map_err(multipart_error)?;
                    if !raw.trim().is_empty() {
                        let value = serde_json::from_str::<Value>(&raw)
                            .map_err(|_| ApiError::from(DocumentError::InvalidMetadata))?;
                        metadata = Some(value);
                    }
                }
                _ => {}
            }
        }

        let (filename, content) = file.ok_or_else(|| ApiError::bad_request("missing file field"))?;
        Ok(Self {
            document_name: document_name.unwrap_or_else(|| filename.clone()),
            filename,
            content,
            metadata,
        })
    }
}

/// Who an audit entry is attributed to.
#[derive(Debug, Clone)]
struct Actor {
    user_id: Option<UserId>,
    ip_address: Option<String>,
}

impl Actor {
    fn new(auth: &AuthUser, headers: &HeaderMap) -> Self {
        Self {
            user_id: auth.user_id(),
            ip_address: client_ip(headers),
        }
    }

    fn stamp(&self, entry: NewAuditEntry) -> NewAuditEntry {
        let entry = entry.from_ip(self.ip_address.clone());
        match self.user_id {
            Some(user_id) => entry.by(user_id),
            None => entry,
        }
    }
}

fn resource(id: impl std::fmt::Display) -> String {
    format!("document:{id}")
}

/// Appends `entry` in its own tenant transaction.
///
/// Used after the request transaction was aborted by a failed statement.
async fn record_detached(state: &AppState, tenant_id: TenantId, entry: NewAuditEntry) -> Result<(), RlsError> {
    let conn = TenantConnection::new(&state.db, tenant_id).await?;
    AuditLogRepository::new(&conn).append(entry).await?;
    conn.commit().await?;
    Ok(())
}

async fn discard_object(storage: &TenantStorage, relative: &str) {
    if let Err(err) = storage.delete(relative).await {
        warn!(tenant_id = %storage.tenant(), key = relative, error = %err, "orphaned upload not removed");
    }
}

/// POST /documents - Upload a document (member+).
async fn upload_document(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<DocumentResponse>)> {
    auth.require(Role::Member)?;
    let form = UploadForm::read(multipart).await?;
    let tenant_id = auth.tenant_id();
    let actor = Actor::new(&auth, &headers);

    let conn = TenantConnection::new(&state.db, tenant_id).await?;
    let audit = AuditLogRepository::new(&conn);
    let docs = DocumentRepository::new(&conn);

    audit
        .append(actor.stamp(NewAuditEntry::success(audit_action::UPLOAD_ATTEMPT)).with_metadata(json!({
            "filename": form.filename,
            "size_bytes": form.content.len(),
        })))
        .await
        .map_err(|e| ApiError::database(&e))?;

    let prepared = match prepare_upload(
        state.intake,
        tenant_id,
        &form.filename,
        &form.document_name,
        form.metadata,
        &form.content,
    ) {
        Ok(prepared) => prepared,
        Err(err) => {
            info!(tenant_id = %tenant_id, error = %err, "upload rejected");
            audit
                .append(
                    actor
                        .stamp(NewAuditEntry::failure(audit_action::UPLOAD_FAILED))
                        .with_metadata(json!({ "reason": err.to_string() })),
                )
                .await
                .map_err(|e| ApiError::database(&e))?;
            conn.commit().await.map_err(|e| ApiError::database(&e))?;
            return Err(err.into());
        }
    };

    if let Some(existing) = docs
        .find_duplicate(&prepared.checksum)
        .await
        .map_err(|e| ApiError::database(&e))?
    {
        info!(tenant_id = %tenant_id, existing_id = %existing.id, "duplicate upload rejected");
        audit
            .append(
                actor
                    .stamp(NewAuditEntry::failure(audit_action::DUPLICATE_REJECTED))
                    .on(resource(existing.id))
                    .with_metadata(json!({ "checksum": prepared.checksum })),
            )
            .await
            .map_err(|e| ApiError::database(&e))?;
        conn.commit().await.map_err(|e| ApiError::database(&e))?;
        return Err(DocumentError::Duplicate {
            checksum: prepared.checksum,
        }
        .into());
    }

    let storage = state.storage.for_tenant(tenant_id);
    let relative = storage.relative_key(&prepared.storage_key)?.to_owned();
    if let Err(err) = storage.write(&relative, form.content).await {
        error!(tenant_id = %tenant_id, document_id = %prepared.document_id, error = %err, "object write failed");
        audit
            .append(
                actor
                    .stamp(NewAuditEntry::failure(audit_action::UPLOAD_FAILED))
                    .on(resource(prepared.document_id))
                    .with_metadata(json!({ "reason": "storage write failed" })),
            )
            .await
            .map_err(|e| ApiError::database(&e))?;
        conn.commit().await.map_err(|e| ApiError::database(&e))?;
        return Err(err.into());
    }

    let inserted = docs.insert(&prepared, actor.user_id).await;
    let model = match inserted {
        Ok(model) => model,
        Err(err) => {
            // The failed INSERT aborted the transaction.
            drop(conn);
            discard_object(&storage, &relative).await;
            let action = match &err {
                DocumentRepoError::Document(DocumentError::Duplicate { .. }) => audit_action::DUPLICATE_REJECTED,
                _ => audit_action::UPLOAD_FAILED,
            };
            let entry = actor
                .stamp(NewAuditEntry::failure(action))
                .on(resource(prepared.document_id))
                .with_metadata(json!({ "checksum": prepared.checksum }));
            if let Err(audit_err) = record_detached(&state, tenant_id, entry).await {
                error!(tenant_id = %tenant_id, error = %audit_err, "failed to record upload failure");
            }
            return Err(err.into());
        }
    };

    audit
        .append(
            actor
                .stamp(NewAuditEntry::success(audit_action::UPLOADED))
                .on(resource(model.id))
                .with_metadata(json!({
                    "checksum": model.checksum,
                    "size_bytes": model.size_bytes,
                    "content_type": model.content_type,
                })),
        )
        .await
        .map_err(|e| ApiError::database(&e))?;

    if let Err(err) = conn.commit().await {
        discard_object(&storage, &relative).await;
        return Err(ApiError::database(&err));
    }

    info!(
        tenant_id = %tenant_id,
        document_id = %model.id,
        size_bytes = model.size_bytes,
        "document uploaded"
    );
    Ok((StatusCode::CREATED, Json(model.into())))
}

/// GET /documents - List live documents, newest first.
async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<PageResponse<DocumentResponse>>> {
    let page = page.normalized();
    let conn = TenantConnection::new(&state.db, auth.tenant_id()).await?;
    let (rows, total) = DocumentRepository::new(&conn)
        .list(page.clone())
        .await
        .map_err(|e| ApiError::database(&e))?;
    conn.commit().await.map_err(|e| ApiError::database(&e))?;

    let data = rows.into_iter().map(DocumentResponse::from).collect();
    Ok(Json(PageResponse::new(data, page.page, page.per_page, total)))
}

/// GET /documents/{id} - Fetch one document.
///
/// A document of another tenant is invisible and reported as not found.
async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DocumentResponse>> {
    let id = DocumentId::from_uuid(id);
    let conn = TenantConnection::new(&state.db, auth.tenant_id()).await?;
    let model = DocumentRepository::new(&conn)
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::database(&e))?
        .filter(|m| DocumentStatus::from(m.status) != DocumentStatus::Deleted)
        .ok_or_else(|| ApiError(AppError::NotFound(format!("document {id}"))))?;
    conn.commit().await.map_err(|e| ApiError::database(&e))?;
    Ok(Json(model.into()))
}

/// DELETE /documents/{id} - Soft-delete a document (admin+).
///
/// The row moves to `deleted` and its checksum becomes available for a new
/// upload. The stored object is kept.
async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    auth.require(Role::Admin)?;
    let id = DocumentId::from_uuid(id);
    let actor = Actor::new(&auth, &headers);

    let conn = TenantConnection::new(&state.db, auth.tenant_id()).await?;
    let deleted = DocumentRepository::new(&conn).soft_delete(id).await?;
    AuditLogRepository::new(&conn)
        .append(
            actor
                .stamp(NewAuditEntry::success(audit_action::DELETED))
                .on(resource(deleted.id))
                .with_metadata(json!({ "checksum": deleted.checksum })),
        )
        .await
        .map_err(|e| ApiError::database(&e))?;
    conn.commit().await.map_err(|e| ApiError::database(&e))?;

    info!(tenant_id = %auth.tenant_id(), document_id = %id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}
