//! In-process embedder: feature hashing over word unigrams and bigrams into
//! a fixed-dimension space, L2-normalized. Needs no model files or network
//! and is fully deterministic; documents sharing vocabulary land near each
//! other, which is what retrieval needs from a self-contained provider.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use pgvector::Vector;

use crate::application::ports::{EmbeddingError, EmbeddingProvider, embedding_provider::l2_normalize};

pub struct LocalEmbeddingProvider {
    dim: usize,
    batch_size: usize,
}

static SHARED: OnceLock<Arc<LocalEmbeddingProvider>> = OnceLock::new();

impl LocalEmbeddingProvider {
    pub fn new(dim: usize, batch_size: usize) -> Self {
        Self { dim, batch_size }
    }

    /// Process-local singleton, initialized once on first use.
    pub fn shared(dim: usize, batch_size: usize) -> Arc<Self> {
        SHARED
            .get_or_init(|| Arc::new(Self::new(dim, batch_size)))
            .clone()
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0f32; self.dim];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        for token in &tokens {
            self.bump(&mut values, token);
        }
        for pair in tokens.windows(2) {
            self.bump(&mut values, &format!("{} {}", pair[0], pair[1]));
        }

        l2_normalize(&mut values);
        values
    }

    fn bump(&self, values: &mut [f32], feature: &str) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
        values[idx] += sign;
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| Vector::from(self.embed_one(t)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn provider_tag(&self) -> &str {
        "local-hash-v1"
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalEmbeddingProvider {
        LocalEmbeddingProvider::new(256, 8)
    }

    #[tokio::test]
    async fn vectors_have_unit_norm() {
        let vectors = provider()
            .embed(&["Alpha beta gamma".to_string()])
            .await
            .unwrap();
        let norm: f32 = vectors[0].as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3);
    }

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let p = provider();
        let a = p.embed(&["same text".to_string()]).await.unwrap();
        let b = p.embed(&["same text".to_string()]).await.unwrap();
        assert_eq!(a[0].as_slice(), b[0].as_slice());
    }

    #[tokio::test]
    async fn similar_text_scores_higher_than_unrelated() {
        let p = provider();
        let vectors = p
            .embed(&[
                "the beta release shipped last week".to_string(),
                "beta release notes for last week".to_string(),
                "completely unrelated cooking recipe with onions".to_string(),
            ])
            .await
            .unwrap();
        let dot = |a: &Vector, b: &Vector| -> f32 {
            a.as_slice()
                .iter()
                .zip(b.as_slice())
                .map(|(x, y)| x * y)
                .sum()
        };
        assert!(dot(&vectors[0], &vectors[1]) > dot(&vectors[0], &vectors[2]));
    }

    #[tokio::test]
    async fn empty_text_is_a_zero_vector() {
        let vectors = provider().embed(&["".to_string()]).await.unwrap();
        assert!(vectors[0].as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn dimension_matches_configuration() {
        assert_eq!(provider().dimension(), 256);
    }
}
