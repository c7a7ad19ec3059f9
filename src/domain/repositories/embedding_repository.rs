use async_trait::async_trait;
use pgvector::Vector;

use super::RepositoryError;
use crate::domain::entities::Embedding;
use crate::domain::value_objects::AggregateStatus;

#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    /// Idempotent upsert keyed by chunk_id, plus the document status advance,
    /// in one transaction. Vectors must already be L2-normalized.
    async fn upsert_for_document(
        &self,
        document_id: i64,
        rows: Vec<(i64, Vector)>,
        provider_tag: &str,
        status: AggregateStatus,
    ) -> Result<usize, RepositoryError>;

    async fn find_for_chunk(&self, chunk_id: i64) -> Result<Option<Embedding>, RepositoryError>;

    async fn count_for_document(&self, document_id: i64) -> Result<i64, RepositoryError>;
}
