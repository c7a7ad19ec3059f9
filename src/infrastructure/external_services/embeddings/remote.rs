//! Remote HTTP embedder with bounded exponential-backoff retries. Responses
//! are renormalized on receipt so the unit-norm invariant holds regardless of
//! what the endpoint guarantees.

use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::ports::{EmbeddingError, EmbeddingProvider, embedding_provider::l2_normalize};

#[derive(Debug, Clone)]
pub struct RemoteEmbeddingConfig {
    pub url: String,
    pub token: Option<String>,
    pub dim: usize,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout: Duration,
    pub backoff_base: Duration,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedRow>,
}

#[derive(Deserialize)]
struct EmbedRow {
    embedding: Vec<f32>,
}

pub struct RemoteEmbeddingProvider {
    client: Client,
    config: RemoteEmbeddingConfig,
}

impl RemoteEmbeddingProvider {
    pub fn new(config: RemoteEmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn call_once(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&EmbedRequest { input: texts });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed
            .data
            .into_iter()
            .map(|row| {
                if row.embedding.len() != self.config.dim {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.config.dim,
                        got: row.embedding.len(),
                    });
                }
                let mut values = row.embedding;
                l2_normalize(&mut values);
                Ok(Vector::from(values))
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0;
        loop {
            match self.call_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                // Malformed payloads and dimension mismatches will not heal
                // on retry.
                Err(e @ EmbeddingError::InvalidResponse(_))
                | Err(e @ EmbeddingError::DimensionMismatch { .. }) => return Err(e),
                Err(EmbeddingError::Unavailable(reason)) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(EmbeddingError::Unavailable(format!(
                            "giving up after {} attempts: {}",
                            attempt, reason
                        )));
                    }
                    let backoff = self.config.backoff_base * 2u32.pow(attempt - 1);
                    warn!(attempt, error = %reason, "embedding call failed, backing off");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn dimension(&self) -> usize {
        self.config.dim
    }

    fn provider_tag(&self) -> &str {
        "remote-http-v1"
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }
}
