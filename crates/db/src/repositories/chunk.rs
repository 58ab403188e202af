//! Chunk repository.

use chrono::Utc;
use ragvault_shared::types::{ChunkId, DocumentId};
use sea_orm::{ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};

use crate::entities::chunks;
use crate::rls::TenantConnection;

/// A chunk produced by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct NewChunk {
    /// Position within the document, starting at zero.
    pub chunk_index: i32,
    /// Chunk text.
    pub text: String,
    /// Token count reported by the tokenizer.
    pub token_count: i32,
    /// Id in the vector store, once embedded.
    pub vector_id: Option<String>,
    /// Vector store name.
    pub vector_store: Option<String>,
}

/// Chunk repository, scoped to one tenant.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRepository<'a> {
    conn: &'a TenantConnection,
}

impl<'a> ChunkRepository<'a> {
    /// Creates a repository over a tenant-bound connection.
    #[must_use]
    pub const fn new(conn: &'a TenantConnection) -> Self {
        Self { conn }
    }

    /// Inserts the chunks of one document. Returns the number inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails, including when the document
    /// belongs to another tenant.
    pub async fn insert_batch(&self, document_id: DocumentId, chunks: Vec<NewChunk>) -> Result<u64, DbErr> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let tenant_id = self.conn.tenant_id().into_inner();
        let now = Utc::now();
        let count = chunks.len() as u64;
        let models = chunks.into_iter().map(|chunk| chunks::ActiveModel {
            id: Set(ChunkId::new().into_inner()),
            tenant_id: Set(tenant_id),
            document_id: Set(document_id.into_inner()),
            chunk_index: Set(chunk.chunk_index),
            text: Set(chunk.text),
            token_count: Set(chunk.token_count),
            vector_id: Set(chunk.vector_id),
            vector_store: Set(chunk.vector_store),
            created_at: Set(now.into()),
        });
        chunks::Entity::insert_many(models)
            .exec(self.conn.transaction())
            .await?;
        Ok(count)
    }

    /// Lists the chunks of a document in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_document(&self, document_id: DocumentId) -> Result<Vec<chunks::Model>, DbErr> {
        chunks::Entity::find()
            .filter(chunks::Column::DocumentId.eq(document_id.into_inner()))
            .order_by_asc(chunks::Column::ChunkIndex)
            .all(self.conn.transaction())
            .await
    }

    /// Counts the chunks of a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_for_document(&self, document_id: DocumentId) -> Result<u64, DbErr> {
        chunks::Entity::find()
            .filter(chunks::Column::DocumentId.eq(document_id.into_inner()))
            .count(self.conn.transaction())
            .await
    }
}
