use async_trait::async_trait;
use pgvector::Vector;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Remote endpoint failed past the retry budget; retryable at the job
    /// level, 503 at query time.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("embedding response malformed: {0}")]
    InvalidResponse(String),

    #[error("provider returned {got}-dim vectors, index schema expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl EmbeddingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Unavailable(_))
    }
}

/// Maps text batches to fixed-dimension vectors. Implementations must return
/// one L2-normalized vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError>;

    /// Fixed at configuration time; checked against the index schema at
    /// startup.
    fn dimension(&self) -> usize;

    /// Stamped on every embedding row written with this provider.
    fn provider_tag(&self) -> &str;

    fn batch_size(&self) -> usize;
}

/// Renormalize in place so the unit-norm invariant holds for every provider,
/// whatever its own normalization guarantees are.
pub fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_yields_unit_norm() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_stays_zero() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }
}
