//! HTTP cross-encoder reranker. Scores come back clamped to [0, 1]; they are
//! not comparable to cosine scores and nobody downstream assumes they are.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::application::ports::{RerankError, RerankResult, Reranker};

#[derive(Debug, Clone)]
pub struct HttpRerankerConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankItem>,
}

#[derive(Deserialize)]
struct RerankItem {
    index: usize,
    score: f32,
}

pub struct HttpReranker {
    client: Client,
    config: HttpRerankerConfig,
}

impl HttpReranker {
    pub fn new(config: HttpRerankerConfig) -> Result<Self, RerankError> {
        Url::parse(&config.url)
            .map_err(|e| RerankError::InvalidResponse(format!("invalid reranker url: {}", e)))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RerankError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankResult>, RerankError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(&self.config.url)
            .json(&RerankRequest { query, documents });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RerankError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| RerankError::Unavailable(e.to_string()))?;

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| RerankError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|item| item.index < documents.len())
            .map(|item| RerankResult {
                index: item.index,
                score: item.score.clamp(0.0, 1.0),
            })
            .collect())
    }
}
