pub mod chunk_repository;
pub mod document_repository;
pub mod element_repository;
pub mod embedding_repository;
pub mod job_repository;
pub mod usage_repository;

pub use chunk_repository::ChunkRepository;
pub use document_repository::DocumentRepository;
pub use element_repository::ElementRepository;
pub use embedding_repository::EmbeddingRepository;
pub use job_repository::JobRepository;
pub use usage_repository::{AnswerUsage, UsageRepository};

use thiserror::Error;

/// Failures surfaced by the metadata store. `Unavailable` is retryable in the
/// job runner and maps to 503 on query paths.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

impl RepositoryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}
