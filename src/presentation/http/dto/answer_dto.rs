use serde::{Deserialize, Serialize};

use crate::application::services::answer::{AnswerRequest, AnswerResponse, Citation, UsageReport};

#[derive(Debug, Deserialize)]
pub struct AnswerRequestDto {
    pub query: String,
    pub top_k: Option<usize>,
    #[serde(default)]
    pub rerank: bool,
    pub max_ctx: Option<usize>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl From<AnswerRequestDto> for AnswerRequest {
    fn from(dto: AnswerRequestDto) -> Self {
        AnswerRequest {
            query: dto.query,
            top_k: dto.top_k,
            rerank: dto.rerank,
            max_ctx_tokens: dto.max_ctx,
            temperature: dto.temperature,
            max_tokens: dto.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerResponseDto {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub usage: UsageReport,
}

impl From<AnswerResponse> for AnswerResponseDto {
    fn from(response: AnswerResponse) -> Self {
        Self {
            answer: response.answer,
            citations: response.citations,
            usage: response.usage,
        }
    }
}
