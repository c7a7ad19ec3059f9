use serde::{Deserialize, Serialize};

use crate::application::services::retriever::Match;

#[derive(Debug, Deserialize)]
pub struct QueryRequestDto {
    pub query: String,
    pub top_k: Option<usize>,
    #[serde(default)]
    pub rerank: bool,
    pub max_ctx: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct QueryUsageDto {
    pub context_tokens: usize,
    pub latency_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct QueryResponseDto {
    pub matches: Vec<Match>,
    pub usage: QueryUsageDto,
}
