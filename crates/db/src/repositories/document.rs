//! Document repository.

use chrono::Utc;
use ragvault_core::document::{DocumentError, DocumentStatus as DomainStatus, PreparedDocument, StatusUpdate};
use ragvault_shared::AppError;
use ragvault_shared::types::{DocumentId, PageRequest, UserId};
use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::entities::documents;
use crate::entities::sea_orm_active_enums::DocumentStatus;
use crate::error::is_unique_violation;
use crate::rls::TenantConnection;

/// Document repository errors.
#[derive(Debug, Error)]
pub enum DocumentRepoError {
    /// Domain rule violation (duplicate, bad transition).
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Document not visible in the bound tenant.
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl From<DocumentRepoError> for AppError {
    fn from(err: DocumentRepoError) -> Self {
        match err {
            DocumentRepoError::Document(e) => e.into(),
            DocumentRepoError::NotFound(id) => Self::NotFound(format!("document {id}")),
            DocumentRepoError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

fn status_value(status: DomainStatus) -> sea_orm::sea_query::SimpleExpr {
    Expr::val(DocumentStatus::from(status)).as_enum(Alias::new("document_status"))
}

/// Document repository, scoped to one tenant.
#[derive(Debug, Clone, Copy)]
pub struct DocumentRepository<'a> {
    conn: &'a TenantConnection,
}

impl<'a> DocumentRepository<'a> {
    /// Creates a repository over a tenant-bound connection.
    #[must_use]
    pub const fn new(conn: &'a TenantConnection) -> Self {
        Self { conn }
    }

    /// Finds a live (not deleted) document with the same content.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_duplicate(&self, checksum: &str) -> Result<Option<documents::Model>, DbErr> {
        documents::Entity::find()
            .filter(documents::Column::Checksum.eq(checksum))
            .filter(documents::Column::Status.ne(DocumentStatus::Deleted))
            .one(self.conn.transaction())
            .await
    }

    /// Inserts a `pending` row for an upload whose bytes are already stored.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Duplicate`] when a concurrent upload of the
    /// same content won the unique index.
    pub async fn insert(
        &self,
        prepared: &PreparedDocument,
        uploaded_by: Option<UserId>,
    ) -> Result<documents::Model, DocumentRepoError> {
        let now = Utc::now().into();
        let document = documents::ActiveModel {
            id: Set(prepared.document_id.into_inner()),
            tenant_id: Set(self.conn.tenant_id().into_inner()),
            storage_key: Set(prepared.storage_key.clone()),
            filename: Set(prepared.filename.clone()),
            document_name: Set(prepared.document_name.clone()),
            content_type: Set(prepared.kind.mime_type().to_string()),
            size_bytes: Set(i64::try_from(prepared.size_bytes).unwrap_or(i64::MAX)),
            checksum: Set(prepared.checksum.clone()),
            status: Set(DocumentStatus::Pending),
            error_message: Set(None),
            chunk_count: Set(0),
            vector_count: Set(0),
            metadata: Set(Some(prepared.metadata.clone())),
            uploaded_by: Set(uploaded_by.map(UserId::into_inner)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = document
            .insert(self.conn.transaction())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DocumentRepoError::Document(DocumentError::Duplicate {
                        checksum: prepared.checksum.clone(),
                    })
                } else {
                    DocumentRepoError::Database(e)
                }
            })?;
        info!(tenant_id = %self.conn.tenant_id(), document_id = %model.id, "document row inserted");
        Ok(model)
    }

    /// Finds a document by id, including deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: DocumentId) -> Result<Option<documents::Model>, DbErr> {
        documents::Entity::find_by_id(id.into_inner())
            .one(self.conn.transaction())
            .await
    }

    /// Lists live documents, newest first. Returns the page and the total.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, page: PageRequest) -> Result<(Vec<documents::Model>, u64), DbErr> {
        let page = page.normalized();
        let query = documents::Entity::find()
            .filter(documents::Column::Status.ne(DocumentStatus::Deleted));
        let total = query.clone().count(self.conn.transaction()).await?;
        let rows = query
            .order_by_desc(documents::Column::CreatedAt)
            .order_by_desc(documents::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(self.conn.transaction())
            .await?;
        Ok((rows, total))
    }

    /// Moves a document to a new status.
    ///
    /// The update only applies while the row still has the status it was
    /// read with, so two racing transitions cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentRepoError::NotFound`] for an invisible document and
    /// [`DocumentError::InvalidTransition`] for a forbidden or lost move.
    pub async fn update_status(
        &self,
        id: DocumentId,
        to: DomainStatus,
        error: Option<String>,
    ) -> Result<documents::Model, DocumentRepoError> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or(DocumentRepoError::NotFound(id))?;
        let from = DomainStatus::from(current.status);
        let update = StatusUpdate::new(from, to, error)?;

        let result = documents::Entity::update_many()
            .col_expr(documents::Column::Status, status_value(update.status))
            .col_expr(documents::Column::ErrorMessage, Expr::value(update.error_message.clone()))
            .col_expr(documents::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(documents::Column::Id.eq(id.into_inner()))
            .filter(documents::Column::Status.eq(current.status))
            .exec(self.conn.transaction())
            .await?;
        if result.rows_affected == 0 {
            return Err(DocumentError::InvalidTransition { from, to }.into());
        }
        debug!(document_id = %id, %from, %to, "document status changed");

        self.find_by_id(id)
            .await?
            .ok_or(DocumentRepoError::NotFound(id))
    }

    /// Soft-deletes a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentRepoError::NotFound`] when the document is not
    /// visible or already deleted.
    pub async fn soft_delete(&self, id: DocumentId) -> Result<documents::Model, DocumentRepoError> {
        match self.update_status(id, DomainStatus::Deleted, None).await {
            Err(DocumentRepoError::Document(DocumentError::InvalidTransition {
                from: DomainStatus::Deleted,
                ..
            })) => Err(DocumentRepoError::NotFound(id)),
            other => other,
        }
    }

    /// Records chunking results.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_counts(&self, id: DocumentId, chunk_count: i32, vector_count: i32) -> Result<bool, DbErr> {
        let result = documents::Entity::update_many()
            .col_expr(documents::Column::ChunkCount, Expr::value(chunk_count))
            .col_expr(documents::Column::VectorCount, Expr::value(vector_count))
            .col_expr(documents::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(documents::Column::Id.eq(id.into_inner()))
            .exec(self.conn.transaction())
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err = DocumentRepoError::Document(DocumentError::Duplicate {
            checksum: "ab".repeat(32),
        });
        let app: AppError = err.into();
        assert_eq!(app.status_code(), 409);
        assert_eq!(app.error_code(), "CONFLICT");
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let app: AppError = DocumentRepoError::NotFound(DocumentId::new()).into();
        assert_eq!(app.status_code(), 404);
    }
}
