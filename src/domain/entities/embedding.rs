use chrono::{DateTime, Utc};
use pgvector::Vector;

/// One dense vector per chunk. Vectors are L2-normalized on write regardless
/// of provider, so cosine similarity reduces to a dot product.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub chunk_id: i64,
    pub vector: Vector,
    pub provider_tag: String,
    pub dim: i32,
    pub updated_at: DateTime<Utc>,
}

impl Embedding {
    /// `|‖v‖₂ − 1| ≤ 1e-3` for every persisted row.
    pub fn norm_is_unit(&self) -> bool {
        let norm: f32 = self
            .vector
            .as_slice()
            .iter()
            .map(|x| x * x)
            .sum::<f32>()
            .sqrt();
        (norm - 1.0).abs() <= 1e-3
    }
}
