pub mod pgvector_index;
pub mod postgres_chunk_repository;
pub mod postgres_document_repository;
pub mod postgres_element_repository;
pub mod postgres_job_repository;
pub mod postgres_usage_repository;

pub use pgvector_index::PgVectorIndex;
pub use postgres_chunk_repository::PostgresChunkRepository;
pub use postgres_document_repository::PostgresDocumentRepository;
pub use postgres_element_repository::PostgresElementRepository;
pub use postgres_job_repository::PostgresJobRepository;
pub use postgres_usage_repository::PostgresUsageRepository;

use crate::domain::repositories::RepositoryError;

/// Anything diesel reports that is not a missing row is treated as a
/// transient store failure.
pub(crate) fn db_err(e: diesel::result::Error) -> RepositoryError {
    RepositoryError::Unavailable(e.to_string())
}
