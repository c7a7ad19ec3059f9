use async_trait::async_trait;
use pgvector::Vector;
use thiserror::Error;

use crate::domain::value_objects::TenantId;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),
}

/// A search hit before hydration. `score = 1 - cosine_distance`, in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: i64,
    pub score: f32,
}

/// Cosine top-k over the embedding rows. The tenant predicate is pushed into
/// the index query itself, so cross-tenant hits cannot leave this boundary.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Results in strictly descending score order, ties broken by lower
    /// chunk_id. `probes` trades recall for latency on IVF indexes.
    async fn search(
        &self,
        tenant: &TenantId,
        query: &Vector,
        top_k: usize,
        probes: Option<i32>,
    ) -> Result<Vec<ScoredChunk>, IndexError>;
}
