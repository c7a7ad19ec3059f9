use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm provider unavailable: {0}")]
    Unavailable(String),

    #[error("llm call exceeded its deadline")]
    Timeout,

    #[error("llm response malformed: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: i32,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub in_tokens: Option<i32>,
    pub out_tokens: Option<i32>,
}

/// Text generation contract. `stream` yields incremental text deltas; the
/// stream ends when generation completes or an error item surfaces.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<LlmResponse, LlmError>;

    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError>;

    fn provider_name(&self) -> &str;

    fn model(&self) -> &str;
}
