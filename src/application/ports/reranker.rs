use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("reranker unavailable: {0}")]
    Unavailable(String),

    #[error("reranker response malformed: {0}")]
    InvalidResponse(String),
}

/// Second-pass relevance score for one candidate. `score` is already clamped
/// to [0, 1]; scores are not comparable to cosine scores across calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    pub index: usize,
    pub score: f32,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score each (query, document) pair. Results may come back in any order;
    /// `index` refers to the input position.
    async fn rerank(&self, query: &str, documents: &[String])
        -> Result<Vec<RerankResult>, RerankError>;
}
