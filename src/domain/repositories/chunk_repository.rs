use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::entities::{Chunk, NewChunk};
use crate::domain::value_objects::{AggregateStatus, TenantId};

#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Replace the document's chunks (and, via cascade, their embeddings) and
    /// advance the aggregate status in one transaction. Returns the inserted
    /// rows with their assigned ids so the embed stage can reference them.
    async fn replace_for_document(
        &self,
        document_id: i64,
        chunks: Vec<NewChunk>,
        status: AggregateStatus,
    ) -> Result<Vec<Chunk>, RepositoryError>;

    async fn list_for_document(&self, document_id: i64) -> Result<Vec<Chunk>, RepositoryError>;

    /// Hydrate retrieval candidates. Only chunks owned by `tenant` come back;
    /// ids from other tenants are silently absent.
    async fn get_by_ids(
        &self,
        tenant: &TenantId,
        ids: &[i64],
    ) -> Result<Vec<Chunk>, RepositoryError>;

    async fn get_for_tenant(&self, tenant: &TenantId, id: i64) -> Result<Chunk, RepositoryError>;
}
