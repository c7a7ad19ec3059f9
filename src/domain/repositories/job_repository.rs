use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::entities::Job;
use crate::domain::value_objects::{JobKind, TenantId};

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Enqueue a stage for a document. The partial unique index on
    /// (document_id, kind) guarantees at most one non-terminal job per stage;
    /// re-enqueueing while one is active returns the existing job.
    async fn enqueue(&self, document_id: i64, kind: JobKind) -> Result<Job, RepositoryError>;

    /// Claim the next runnable job of `kind`, or None when the queue is
    /// drained. Uses FOR UPDATE SKIP LOCKED so concurrent runners never hand
    /// the same job to two workers; the claimed job comes back `running` with
    /// attempts already incremented.
    async fn claim(&self, kind: JobKind) -> Result<Option<Job>, RepositoryError>;

    async fn save(&self, job: &Job) -> Result<(), RepositoryError>;

    async fn update_progress(&self, job_id: i64, progress: i32) -> Result<(), RepositoryError>;

    async fn find_for_tenant(&self, tenant: &TenantId, job_id: i64)
        -> Result<Job, RepositoryError>;

    async fn list_for_document(
        &self,
        tenant: &TenantId,
        document_id: i64,
    ) -> Result<Vec<Job>, RepositoryError>;
}
