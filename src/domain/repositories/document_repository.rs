use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::entities::{Document, NewDocument};
use crate::domain::value_objects::{AggregateStatus, TenantId};

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, document: NewDocument) -> Result<Document, RepositoryError>;

    /// Unscoped lookup for workers, which address documents by id from a
    /// claimed job and take the tenant from the row itself.
    async fn find(&self, id: i64) -> Result<Document, RepositoryError>;

    /// Tenant-scoped lookup for all API read paths.
    async fn find_for_tenant(
        &self,
        tenant: &TenantId,
        id: i64,
    ) -> Result<Document, RepositoryError>;

    async fn set_status(&self, id: i64, status: AggregateStatus) -> Result<(), RepositoryError>;

    /// The storage key embeds the document id, so the uri lands in a second
    /// write after insert.
    async fn set_storage_uri(&self, id: i64, uri: &str) -> Result<(), RepositoryError>;

    /// Cascades to elements, chunks and embeddings. Used to compensate when
    /// the object store rejects the upload after the row was created.
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;

    async fn aggregate_status(&self, id: i64) -> Result<AggregateStatus, RepositoryError>;
}
