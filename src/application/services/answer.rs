//! Answer orchestration: retrieval-aware prompt construction, sync or
//! streaming generation, citation extraction and the answer cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::application::ports::{ChatMessage, GenerationParams, LlmError, LlmProvider};
use crate::application::services::answer_cache::AnswerCache;
use crate::application::services::retriever::{
    Retrieval, RetrievalError, RetrievalRequest, RetrieverService,
};
use crate::application::services::token::count_tokens;
use crate::domain::repositories::{AnswerUsage, UsageRepository};
use crate::domain::value_objects::TenantId;

const SYSTEM_INSTRUCTION: &str = "You answer strictly from the numbered context blocks below. \
Cite the blocks you rely on inline as [1], [2] and so on. \
If the context does not contain the answer, say that you do not know; never invent facts.";

const REFUSAL_MARKERS: [&str; 3] = ["do not know", "don't know", "cannot find"];

#[derive(Debug, Error)]
pub enum AnswerError {
    /// Retrieval failed; the LLM is never called in this case.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub rerank: bool,
    pub max_ctx_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: i64,
    pub chunk_id: i64,
    pub page: Option<i32>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub in_tokens: Option<i32>,
    pub out_tokens: Option<i32>,
    pub latency_ms: i64,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub usage: UsageReport,
}

/// Streamed answer protocol. Every stream ends with exactly one terminal
/// event: `Done` or `Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerEvent {
    Chunk { text: String },
    Done { citations: Vec<Citation>, usage: UsageReport },
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub temperature_default: f32,
    pub max_tokens_default: i32,
    pub cache_ttl: Duration,
}

pub struct AnswerService {
    retriever: Arc<RetrieverService>,
    llm: Arc<dyn LlmProvider>,
    usage_log: Arc<dyn UsageRepository>,
    cache: Arc<AnswerCache>,
    config: AnswerConfig,
}

impl AnswerService {
    pub fn new(
        retriever: Arc<RetrieverService>,
        llm: Arc<dyn LlmProvider>,
        usage_log: Arc<dyn UsageRepository>,
        config: AnswerConfig,
    ) -> Self {
        Self {
            retriever,
            llm,
            usage_log,
            cache: Arc::new(AnswerCache::new(config.cache_ttl)),
            config,
        }
    }

    fn params(&self, request: &AnswerRequest) -> GenerationParams {
        GenerationParams {
            temperature: request
                .temperature
                .unwrap_or(self.config.temperature_default),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens_default),
        }
    }

    fn fingerprint(&self, tenant: &TenantId, request: &AnswerRequest) -> String {
        AnswerCache::fingerprint(
            tenant,
            &request.query,
            request
                .top_k
                .unwrap_or(self.retriever.config().top_k_default),
            request.rerank,
            request
                .max_ctx_tokens
                .unwrap_or(self.retriever.config().max_ctx_tokens_default),
            self.llm.model(),
        )
    }

    async fn retrieve(
        &self,
        tenant: &TenantId,
        request: &AnswerRequest,
    ) -> Result<Retrieval, AnswerError> {
        let retrieval_request = RetrievalRequest {
            query: request.query.clone(),
            top_k: request.top_k,
            rerank: request.rerank,
            max_ctx_tokens: request.max_ctx_tokens,
        };
        Ok(self.retriever.retrieve(tenant, &retrieval_request).await?)
    }

    pub async fn answer(
        &self,
        tenant: &TenantId,
        request: &AnswerRequest,
    ) -> Result<AnswerResponse, AnswerError> {
        let fingerprint = self.fingerprint(tenant, request);
        if let Some(hit) = self.cache.get(&fingerprint) {
            return Ok(hit);
        }

        let retrieval = self.retrieve(tenant, request).await?;
        let messages = build_messages(&request.query, &retrieval);
        let prompt_tokens: usize = messages.iter().map(|m| count_tokens(&m.content)).sum();

        let started = Instant::now();
        let generated = self.llm.generate(&messages, self.params(request)).await?;
        let latency_ms = started.elapsed().as_millis() as i64;

        let citations = extract_citations(&generated.text, &retrieval);
        let usage = UsageReport {
            in_tokens: generated.in_tokens.or(Some(prompt_tokens as i32)),
            out_tokens: generated
                .out_tokens
                .or(Some(count_tokens(&generated.text) as i32)),
            latency_ms,
            provider: self.llm.provider_name().to_string(),
            model: self.llm.model().to_string(),
        };
        self.record_usage(tenant, &request.query, &usage).await;

        let response = AnswerResponse {
            answer: generated.text,
            citations,
            usage,
        };
        self.cache.put(fingerprint, response.clone());
        Ok(response)
    }

    /// Streamed variant. Retrieval errors surface before the stream opens so
    /// the facade can answer 503; once streaming, failures arrive as a
    /// terminal `Error` event and partial output is discarded for caching.
    pub async fn answer_stream(
        &self,
        tenant: &TenantId,
        request: &AnswerRequest,
    ) -> Result<BoxStream<'static, AnswerEvent>, AnswerError> {
        let fingerprint = self.fingerprint(tenant, request);
        if let Some(hit) = self.cache.get(&fingerprint) {
            let replay = futures::stream::iter(vec![
                AnswerEvent::Chunk { text: hit.answer },
                AnswerEvent::Done {
                    citations: hit.citations,
                    usage: hit.usage,
                },
            ]);
            return Ok(replay.boxed());
        }

        let retrieval = self.retrieve(tenant, request).await?;
        let messages = build_messages(&request.query, &retrieval);
        let prompt_tokens: usize = messages.iter().map(|m| count_tokens(&m.content)).sum();

        let started = Instant::now();
        let mut llm_stream = self.llm.stream(&messages, self.params(request)).await?;

        let provider = self.llm.provider_name().to_string();
        let model = self.llm.model().to_string();
        let tenant = tenant.clone();
        let query = request.query.clone();
        let usage_log = self.usage_log.clone();
        let cache = self.cache.clone();

        let (tx, mut rx) = tokio::sync::mpsc::channel::<AnswerEvent>(32);
        tokio::spawn(async move {
            let mut answer = String::new();
            while let Some(item) = llm_stream.next().await {
                match item {
                    Ok(delta) => {
                        answer.push_str(&delta);
                        if tx
                            .send(AnswerEvent::Chunk { text: delta })
                            .await
                            .is_err()
                        {
                            // Client went away; stop generating.
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(AnswerEvent::Error {
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }

            let latency_ms = started.elapsed().as_millis() as i64;
            let citations = extract_citations(&answer, &retrieval);
            let usage = UsageReport {
                in_tokens: Some(prompt_tokens as i32),
                out_tokens: Some(count_tokens(&answer) as i32),
                latency_ms,
                provider,
                model,
            };
            if let Err(e) = usage_log
                .record(AnswerUsage {
                    tenant_id: tenant,
                    query,
                    provider: usage.provider.clone(),
                    model: usage.model.clone(),
                    in_tokens: usage.in_tokens,
                    out_tokens: usage.out_tokens,
                    latency_ms: usage.latency_ms as i32,
                    created_at: Utc::now(),
                })
                .await
            {
                warn!(error = %e, "failed to record answer usage");
            }
            cache.put(
                fingerprint,
                AnswerResponse {
                    answer,
                    citations: citations.clone(),
                    usage: usage.clone(),
                },
            );
            let _ = tx.send(AnswerEvent::Done { citations, usage }).await;
        });

        let stream = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));
        Ok(stream.boxed())
    }

    async fn record_usage(&self, tenant: &TenantId, query: &str, usage: &UsageReport) {
        let record = AnswerUsage {
            tenant_id: tenant.clone(),
            query: query.to_string(),
            provider: usage.provider.clone(),
            model: usage.model.clone(),
            in_tokens: usage.in_tokens,
            out_tokens: usage.out_tokens,
            latency_ms: usage.latency_ms as i32,
            created_at: Utc::now(),
        };
        if let Err(e) = self.usage_log.record(record).await {
            warn!(error = %e, "failed to record answer usage");
        }
    }
}

/// System instruction with the grounding and refusal rule, numbered context
/// blocks aligned with match indices, the user query last.
pub fn build_messages(query: &str, retrieval: &Retrieval) -> Vec<ChatMessage> {
    let mut context = String::new();
    for (i, (m, text)) in retrieval
        .matches
        .iter()
        .zip(retrieval.context_texts.iter())
        .enumerate()
    {
        let breadcrumbs = if m.breadcrumbs.is_empty() {
            String::from("(document)")
        } else {
            m.breadcrumbs.join(" > ")
        };
        context.push_str(&format!("[{}] {}\n{}\n\n", i + 1, breadcrumbs, text));
    }

    vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(format!(
            "Context:\n\n{}Question: {}",
            context, query
        )),
    ]
}

/// Citations are the matches the model referenced as `[i]`, de-duplicated in
/// first-occurrence order. A refusal carries no citations; a non-refusal
/// answer without markers cites every match.
pub fn extract_citations(answer: &str, retrieval: &Retrieval) -> Vec<Citation> {
    let mut indices: Vec<usize> = Vec::new();
    let bytes = answer.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let mut j = i + 1;
            let mut value: usize = 0;
            let mut digits = 0;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                value = value * 10 + (bytes[j] - b'0') as usize;
                digits += 1;
                j += 1;
            }
            if digits > 0 && j < bytes.len() && bytes[j] == b']' {
                if value >= 1 && value <= retrieval.matches.len() && !indices.contains(&(value - 1))
                {
                    indices.push(value - 1);
                }
                i = j;
            }
        }
        i += 1;
    }

    if indices.is_empty() {
        if is_refusal(answer) {
            return Vec::new();
        }
        indices = (0..retrieval.matches.len()).collect();
    }

    indices
        .into_iter()
        .map(|idx| {
            let m = &retrieval.matches[idx];
            Citation {
                doc_id: m.doc_id,
                chunk_id: m.chunk_id,
                page: m.page,
                score: m.score,
            }
        })
        .collect()
}

pub fn is_refusal(answer: &str) -> bool {
    let lowered = answer.to_lowercase();
    REFUSAL_MARKERS.iter().any(|m| lowered.contains(m))
}

#[cfg(test)]
mod service_tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::application::ports::ScoredChunk;
    use crate::application::services::retriever::test_support::{chunk, service};
    use crate::application::services::retriever::RetrievalConfig;
    use crate::domain::repositories::RepositoryError;

    struct ScriptedLlm {
        answer: String,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _params: GenerationParams,
        ) -> Result<crate::application::ports::LlmResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            Ok(crate::application::ports::LlmResponse {
                text: self.answer.clone(),
                in_tokens: Some(40),
                out_tokens: Some(12),
            })
        }

        async fn stream(
            &self,
            _messages: &[ChatMessage],
            _params: GenerationParams,
        ) -> Result<futures::stream::BoxStream<'static, Result<String, LlmError>>, LlmError>
        {
            *self.calls.lock().unwrap() += 1;
            let pieces: Vec<Result<String, LlmError>> = self
                .answer
                .split_inclusive(' ')
                .map(|p| Ok(p.to_string()))
                .collect();
            Ok(futures::stream::iter(pieces).boxed())
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-v1"
        }
    }

    struct RecordingUsage {
        records: Mutex<Vec<AnswerUsage>>,
    }

    #[async_trait]
    impl UsageRepository for RecordingUsage {
        async fn record(&self, usage: AnswerUsage) -> Result<(), RepositoryError> {
            self.records.lock().unwrap().push(usage);
            Ok(())
        }
    }

    fn answer_service(answer_text: &str, ttl: Duration) -> (AnswerService, Arc<RecordingUsage>) {
        let retriever = Arc::new(service(
            vec![
                ScoredChunk { chunk_id: 1, score: 0.9 },
                ScoredChunk { chunk_id: 2, score: 0.8 },
            ],
            vec![
                chunk(1, 20, "Beta is the second phase."),
                chunk(2, 20, "Gamma follows beta."),
            ],
            None,
            RetrievalConfig::default(),
        ));
        let usage = Arc::new(RecordingUsage {
            records: Mutex::new(Vec::new()),
        });
        let service = AnswerService::new(
            retriever,
            Arc::new(ScriptedLlm {
                answer: answer_text.to_string(),
                calls: Mutex::new(0),
            }),
            usage.clone(),
            AnswerConfig {
                temperature_default: 0.2,
                max_tokens_default: 128,
                cache_ttl: ttl,
            },
        );
        (service, usage)
    }

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    fn request(query: &str) -> AnswerRequest {
        AnswerRequest {
            query: query.to_string(),
            top_k: Some(5),
            rerank: false,
            max_ctx_tokens: Some(1000),
            temperature: Some(0.0),
            max_tokens: Some(64),
        }
    }

    #[tokio::test]
    async fn answer_returns_citations_and_usage() {
        let (service, usage) = answer_service("Beta is a phase [1].", Duration::ZERO);
        let response = service.answer(&tenant(), &request("beta?")).await.unwrap();

        assert_eq!(response.answer, "Beta is a phase [1].");
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].chunk_id, 1);
        assert!(response.usage.in_tokens.unwrap() > 0);
        assert!(response.usage.out_tokens.unwrap() > 0);
        assert_eq!(usage.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn identical_requests_within_ttl_hit_the_cache() {
        let (service, usage) = answer_service("Cached [1].", Duration::from_secs(60));
        let first = service.answer(&tenant(), &request("beta?")).await.unwrap();
        let second = service.answer(&tenant(), &request("beta?")).await.unwrap();

        assert_eq!(first.answer, second.answer);
        assert_eq!(first.citations, second.citations);
        // Only the first call reached the model and the usage log.
        assert_eq!(usage.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stream_ends_with_exactly_one_terminal_event() {
        let (service, _) = answer_service("Streaming beta [2].", Duration::ZERO);
        let mut stream = service
            .answer_stream(&tenant(), &request("beta?"))
            .await
            .unwrap();

        let mut chunks = 0;
        let mut terminals = 0;
        let mut last_was_terminal = false;
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            last_was_terminal = false;
            match event {
                AnswerEvent::Chunk { text: t } => {
                    chunks += 1;
                    text.push_str(&t);
                }
                AnswerEvent::Done { citations, .. } => {
                    terminals += 1;
                    last_was_terminal = true;
                    assert_eq!(citations.len(), 1);
                    assert_eq!(citations[0].chunk_id, 2);
                }
                AnswerEvent::Error { .. } => {
                    terminals += 1;
                    last_was_terminal = true;
                }
            }
        }
        assert!(chunks > 0);
        assert_eq!(terminals, 1);
        assert!(last_was_terminal);
        assert_eq!(text, "Streaming beta [2].");
    }

    #[tokio::test]
    async fn stream_failure_emits_error_and_skips_cache() {
        struct FailingLlm;

        #[async_trait]
        impl LlmProvider for FailingLlm {
            async fn generate(
                &self,
                _messages: &[ChatMessage],
                _params: GenerationParams,
            ) -> Result<crate::application::ports::LlmResponse, LlmError> {
                Err(LlmError::Unavailable("down".to_string()))
            }

            async fn stream(
                &self,
                _messages: &[ChatMessage],
                _params: GenerationParams,
            ) -> Result<futures::stream::BoxStream<'static, Result<String, LlmError>>, LlmError>
            {
                let items: Vec<Result<String, LlmError>> = vec![
                    Ok("partial ".to_string()),
                    Err(LlmError::Unavailable("mid-stream".to_string())),
                ];
                Ok(futures::stream::iter(items).boxed())
            }

            fn provider_name(&self) -> &str {
                "failing"
            }

            fn model(&self) -> &str {
                "failing-v1"
            }
        }

        let retriever = Arc::new(service(
            vec![ScoredChunk { chunk_id: 1, score: 0.9 }],
            vec![chunk(1, 20, "Beta is the second phase.")],
            None,
            RetrievalConfig::default(),
        ));
        let usage = Arc::new(RecordingUsage {
            records: Mutex::new(Vec::new()),
        });
        let answer_service = AnswerService::new(
            retriever,
            Arc::new(FailingLlm),
            usage,
            AnswerConfig {
                temperature_default: 0.2,
                max_tokens_default: 128,
                cache_ttl: Duration::from_secs(60),
            },
        );

        let mut stream = answer_service
            .answer_stream(&tenant(), &request("beta?"))
            .await
            .unwrap();
        let mut saw_error = false;
        while let Some(event) = stream.next().await {
            if matches!(event, AnswerEvent::Error { .. }) {
                saw_error = true;
            }
        }
        assert!(saw_error);

        // The partial output must not satisfy a later identical request.
        let mut replay = answer_service
            .answer_stream(&tenant(), &request("beta?"))
            .await
            .unwrap();
        let first = replay.next().await.unwrap();
        assert!(!matches!(first, AnswerEvent::Done { .. }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::retriever::Match;

    fn retrieval_with(n: usize) -> Retrieval {
        let matches = (0..n)
            .map(|i| Match {
                doc_id: 1,
                chunk_id: 10 + i as i64,
                page: Some(i as i32 + 1),
                score: 0.9 - i as f32 * 0.1,
                snippet: format!("snippet {}", i),
                breadcrumbs: vec![format!("Section {}", i)],
            })
            .collect();
        Retrieval {
            matches,
            context_texts: (0..n).map(|i| format!("full text {}", i)).collect(),
            context_tokens: n * 3,
        }
    }

    #[test]
    fn prompt_numbers_blocks_and_ends_with_query() {
        let messages = build_messages("What is Beta?", &retrieval_with(2));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("do not know"));
        let user = &messages[1].content;
        assert!(user.contains("[1] Section 0\nfull text 0"));
        assert!(user.contains("[2] Section 1\nfull text 1"));
        assert!(user.trim_end().ends_with("Question: What is Beta?"));
    }

    #[test]
    fn markers_map_to_matches_in_first_occurrence_order() {
        let citations = extract_citations(
            "Beta is defined in [2], see also [1]. As [2] notes, it holds.",
            &retrieval_with(3),
        );
        let ids: Vec<i64> = citations.iter().map(|c| c.chunk_id).collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[test]
    fn out_of_range_markers_are_ignored() {
        let citations = extract_citations("Cited [7] and [0].", &retrieval_with(2));
        // No valid markers and not a refusal: fall back to all matches.
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn unmarked_answer_cites_everything() {
        let citations = extract_citations("Beta is a phase.", &retrieval_with(2));
        assert_eq!(citations.len(), 2);
    }

    #[test]
    fn refusal_carries_no_citations() {
        let citations = extract_citations(
            "I do not know; the context does not cover Neptune.",
            &retrieval_with(2),
        );
        assert!(citations.is_empty());
    }
}
