//! Remote chat-completions provider over an OpenAI-compatible endpoint, with
//! SSE streaming for the incremental path.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::application::ports::{
    ChatMessage, GenerationParams, LlmError, LlmProvider, LlmResponse,
};

#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    pub url: String,
    pub token: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

pub struct HttpLlmProvider {
    client: Client,
    config: HttpLlmConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<i32>,
    completion_tokens: Option<i32>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl HttpLlmProvider {
    pub fn new(config: HttpLlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn body(&self, messages: &[ChatMessage], params: GenerationParams, stream: bool) -> serde_json::Value {
        let wire: Vec<WireMessage> = messages
            .iter()
            .map(|m| WireMessage {
                role: m.role,
                content: &m.content,
            })
            .collect();
        json!({
            "model": self.config.model,
            "messages": wire,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": stream,
        })
    }

    fn map_send_error(e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Unavailable(e.to_string())
        }
    }

    async fn post(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&self.body(messages, params, stream));
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(Self::map_send_error)?
            .error_for_status()
            .map_err(|e| LlmError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.post(messages, params, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        let (in_tokens, out_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((None, None));

        Ok(LlmResponse {
            text,
            in_tokens,
            out_tokens,
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError> {
        let response = self.post(messages, params, true).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream_lines(move |tx| async move {
            let mut buffer = String::new();
            while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(Self::map_send_error(e))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    let Some(payload) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let payload = payload.trim();
                    if payload == "[DONE]" {
                        return;
                    }
                    match serde_json::from_str::<StreamChunk>(payload) {
                        Ok(chunk) => {
                            if let Some(delta) = chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta.content)
                            {
                                if tx.send(Ok(delta)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(LlmError::InvalidResponse(e.to_string()))).await;
                            return;
                        }
                    }
                }
            }
        });
        Ok(stream)
    }

    fn provider_name(&self) -> &str {
        "remote"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Bridge a producer task to a boxed stream through a small channel.
fn async_stream_lines<F, Fut>(producer: F) -> BoxStream<'static, Result<String, LlmError>>
where
    F: FnOnce(tokio::sync::mpsc::Sender<Result<String, LlmError>>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(producer(tx));
    futures::stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed()
}
