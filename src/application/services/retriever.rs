//! Dense retrieval: embed the query, search the index under the caller's
//! tenant, optionally rerank, then assemble a token-budgeted context.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::application::ports::{EmbeddingProvider, Reranker, VectorIndex};
use crate::domain::entities::Chunk;
use crate::domain::repositories::ChunkRepository;
use crate::domain::value_objects::TenantId;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub top_k_default: usize,
    pub top_k_max: usize,
    pub max_ctx_tokens_default: usize,
    pub max_ctx_cap: usize,
    pub max_ctx_chunks: usize,
    pub snippet_max_chars: usize,
    pub probes: Option<i32>,
    pub rerank_enabled: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_default: 10,
            top_k_max: 50,
            max_ctx_tokens_default: 2000,
            max_ctx_cap: 6000,
            max_ctx_chunks: 6,
            snippet_max_chars: 300,
            probes: None,
            rerank_enabled: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub rerank: bool,
    pub max_ctx_tokens: Option<usize>,
}

/// A retrieved chunk with score and presentation metadata.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Match {
    pub doc_id: i64,
    pub chunk_id: i64,
    pub page: Option<i32>,
    pub score: f32,
    pub snippet: String,
    pub breadcrumbs: Vec<String>,
}

/// Matches plus the full chunk texts backing them, index-aligned, for prompt
/// construction.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub matches: Vec<Match>,
    pub context_texts: Vec<String>,
    pub context_tokens: usize,
}

pub struct RetrieverService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    chunks: Arc<dyn ChunkRepository>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrievalConfig,
}

impl RetrieverService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        chunks: Arc<dyn ChunkRepository>,
        reranker: Option<Arc<dyn Reranker>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            chunks,
            reranker,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn retrieve(
        &self,
        tenant: &TenantId,
        request: &RetrievalRequest,
    ) -> Result<Retrieval, RetrievalError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        let top_k = request
            .top_k
            .unwrap_or(self.config.top_k_default)
            .clamp(1, self.config.top_k_max);
        let max_ctx_tokens = request
            .max_ctx_tokens
            .unwrap_or(self.config.max_ctx_tokens_default)
            .min(self.config.max_ctx_cap);

        let query_vec = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RetrievalError::Unavailable("embedder returned no vector".to_string())
            })?;

        let hits = self
            .index
            .search(tenant, &query_vec, top_k, self.config.probes)
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        if hits.is_empty() {
            return Ok(Retrieval {
                matches: Vec::new(),
                context_texts: Vec::new(),
                context_tokens: 0,
            });
        }

        // Hydrate. The repository only returns the caller's rows, so a hit
        // that fails to hydrate is dropped rather than leaked.
        let ids: Vec<i64> = hits.iter().map(|h| h.chunk_id).collect();
        let chunk_rows = self
            .chunks
            .get_by_ids(tenant, &ids)
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;
        let by_id: HashMap<i64, Chunk> =
            chunk_rows.into_iter().map(|c| (c.id, c)).collect();

        let mut scored: Vec<(Chunk, f32)> = hits
            .into_iter()
            .filter_map(|hit| {
                by_id
                    .get(&hit.chunk_id)
                    .map(|c| (c.clone(), hit.score.clamp(0.0, 1.0)))
            })
            .collect();

        if request.rerank && self.config.rerank_enabled {
            if let Some(reranker) = &self.reranker {
                let documents: Vec<String> =
                    scored.iter().map(|(c, _)| c.text.clone()).collect();
                let results = reranker
                    .rerank(query, &documents)
                    .await
                    .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;
                for result in results {
                    if let Some(entry) = scored.get_mut(result.index) {
                        entry.1 = result.score.clamp(0.0, 1.0);
                    }
                }
            }
        }

        // Final order: score desc, ties by lower chunk id.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        // Greedy context: take candidates in rank order while they fit the
        // token budget, up to max_ctx_chunks.
        let mut matches = Vec::new();
        let mut context_texts = Vec::new();
        let mut context_tokens = 0usize;
        for (chunk, score) in scored {
            if matches.len() >= self.config.max_ctx_chunks {
                break;
            }
            let tokens = chunk.token_count.max(0) as usize;
            if context_tokens + tokens > max_ctx_tokens {
                continue;
            }
            context_tokens += tokens;
            matches.push(Match {
                doc_id: chunk.document_id,
                chunk_id: chunk.id,
                page: chunk.page,
                score,
                snippet: make_snippet(&chunk.text, self.config.snippet_max_chars),
                breadcrumbs: chunk.header_path.clone(),
            });
            context_texts.push(chunk.text);
        }

        Ok(Retrieval {
            matches,
            context_texts,
            context_tokens,
        })
    }
}

/// Truncate to at most `max_chars`, preferring a sentence boundary and
/// falling back to a whitespace boundary. Never cuts inside a UTF-8
/// character.
pub fn make_snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();

    if let Some(pos) = cut.rfind(['.', '!', '?']) {
        // A boundary too close to the start would degenerate the snippet.
        if pos + 1 >= max_chars / 2 {
            return cut[..=pos].trim_end().to_string();
        }
    }
    match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => format!("{}…", cut[..pos].trim_end()),
        _ => format!("{}…", cut),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use pgvector::Vector;

    use crate::application::ports::{
        EmbeddingError, IndexError, RerankError, RerankResult, ScoredChunk,
    };
    use crate::domain::entities::NewChunk;
    use crate::domain::repositories::RepositoryError;
    use crate::domain::value_objects::AggregateStatus;

    /// Fixed-output embedder for tests.
    pub struct StubEmbedder {
        pub dim: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|_| {
                    let mut v = vec![0.0; self.dim];
                    v[0] = 1.0;
                    Vector::from(v)
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dim
        }

        fn provider_tag(&self) -> &str {
            "stub"
        }

        fn batch_size(&self) -> usize {
            8
        }
    }

    /// Index returning a canned hit list.
    pub struct StubIndex {
        pub hits: Vec<ScoredChunk>,
    }

    #[async_trait]
    impl VectorIndex for StubIndex {
        async fn search(
            &self,
            _tenant: &TenantId,
            _query: &Vector,
            top_k: usize,
            _probes: Option<i32>,
        ) -> Result<Vec<ScoredChunk>, IndexError> {
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }
    }

    /// In-memory chunk table keyed by tenant.
    pub struct StubChunks {
        pub tenant: String,
        pub rows: Vec<Chunk>,
    }

    #[async_trait]
    impl ChunkRepository for StubChunks {
        async fn replace_for_document(
            &self,
            _document_id: i64,
            _chunks: Vec<NewChunk>,
            _status: AggregateStatus,
        ) -> Result<Vec<Chunk>, RepositoryError> {
            unimplemented!("not needed by retrieval tests")
        }

        async fn list_for_document(
            &self,
            _document_id: i64,
        ) -> Result<Vec<Chunk>, RepositoryError> {
            Ok(self.rows.clone())
        }

        async fn get_by_ids(
            &self,
            tenant: &TenantId,
            ids: &[i64],
        ) -> Result<Vec<Chunk>, RepositoryError> {
            if tenant.as_str() != self.tenant {
                return Ok(Vec::new());
            }
            Ok(self
                .rows
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect())
        }

        async fn get_for_tenant(
            &self,
            tenant: &TenantId,
            id: i64,
        ) -> Result<Chunk, RepositoryError> {
            self.get_by_ids(tenant, &[id])
                .await?
                .into_iter()
                .next()
                .ok_or(RepositoryError::NotFound {
                    entity: "chunk",
                    id,
                })
        }
    }

    /// Reranker scoring by document position, highest for the last input.
    pub struct ReversingReranker;

    #[async_trait]
    impl Reranker for ReversingReranker {
        async fn rerank(
            &self,
            _query: &str,
            documents: &[String],
        ) -> Result<Vec<RerankResult>, RerankError> {
            let n = documents.len();
            Ok((0..n)
                .map(|i| RerankResult {
                    index: i,
                    score: (i + 1) as f32 / n as f32,
                })
                .collect())
        }
    }

    pub fn chunk(id: i64, tokens: i32, text: &str) -> Chunk {
        Chunk {
            id,
            document_id: 1,
            ordinal: id as i32,
            page: Some(1),
            token_count: tokens,
            text: text.to_string(),
            header_path: vec!["Doc".to_string()],
            is_table: false,
        }
    }

    pub fn service(
        hits: Vec<ScoredChunk>,
        rows: Vec<Chunk>,
        reranker: Option<Arc<dyn Reranker>>,
        config: RetrievalConfig,
    ) -> RetrieverService {
        RetrieverService::new(
            Arc::new(StubEmbedder { dim: 8 }),
            Arc::new(StubIndex { hits }),
            Arc::new(StubChunks {
                tenant: "acme".to_string(),
                rows,
            }),
            reranker,
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::application::ports::ScoredChunk;
    use crate::application::services::token::count_tokens;

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    fn request(query: &str) -> RetrievalRequest {
        RetrievalRequest {
            query: query.to_string(),
            top_k: Some(10),
            rerank: false,
            max_ctx_tokens: Some(1000),
        }
    }

    #[tokio::test]
    async fn matches_are_sorted_and_unique() {
        let hits = vec![
            ScoredChunk { chunk_id: 1, score: 0.9 },
            ScoredChunk { chunk_id: 2, score: 0.7 },
            ScoredChunk { chunk_id: 3, score: 0.5 },
        ];
        let rows = vec![
            chunk(1, 10, "first"),
            chunk(2, 10, "second"),
            chunk(3, 10, "third"),
        ];
        let service = service(hits, rows, None, RetrievalConfig::default());

        let retrieval = service.retrieve(&tenant(), &request("q")).await.unwrap();
        let scores: Vec<f32> = retrieval.matches.iter().map(|m| m.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        let ids: Vec<i64> = retrieval.matches.iter().map(|m| m.chunk_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(retrieval.matches.iter().all(|m| (0.0..=1.0).contains(&m.score)));
    }

    #[tokio::test]
    async fn cross_tenant_hits_never_hydrate() {
        let hits = vec![ScoredChunk { chunk_id: 1, score: 0.9 }];
        let rows = vec![chunk(1, 10, "secret")];
        let service = service(hits, rows, None, RetrievalConfig::default());

        let other = TenantId::new("intruder").unwrap();
        let retrieval = service.retrieve(&other, &request("q")).await.unwrap();
        assert!(retrieval.matches.is_empty());
    }

    #[tokio::test]
    async fn context_respects_token_budget() {
        let hits = vec![
            ScoredChunk { chunk_id: 1, score: 0.9 },
            ScoredChunk { chunk_id: 2, score: 0.8 },
            ScoredChunk { chunk_id: 3, score: 0.7 },
        ];
        let rows = vec![
            chunk(1, 400, "big"),
            chunk(2, 400, "too big together"),
            chunk(3, 50, "small"),
        ];
        let service = service(hits, rows, None, RetrievalConfig::default());

        let mut req = request("q");
        req.max_ctx_tokens = Some(500);
        let retrieval = service.retrieve(&tenant(), &req).await.unwrap();
        // The second candidate would blow the budget and is skipped; the
        // third still fits.
        let ids: Vec<i64> = retrieval.matches.iter().map(|m| m.chunk_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(retrieval.context_tokens <= 500);
    }

    #[tokio::test]
    async fn context_stops_at_chunk_cap() {
        let hits: Vec<ScoredChunk> = (1..=10)
            .map(|i| ScoredChunk {
                chunk_id: i,
                score: 1.0 - i as f32 * 0.05,
            })
            .collect();
        let rows: Vec<_> = (1..=10).map(|i| chunk(i, 10, "text")).collect();
        let service = service(hits, rows, None, RetrievalConfig::default());

        let retrieval = service.retrieve(&tenant(), &request("q")).await.unwrap();
        assert_eq!(retrieval.matches.len(), 6);
    }

    #[tokio::test]
    async fn rerank_replaces_scores_and_reorders() {
        let hits = vec![
            ScoredChunk { chunk_id: 1, score: 0.9 },
            ScoredChunk { chunk_id: 2, score: 0.8 },
        ];
        let rows = vec![chunk(1, 10, "first"), chunk(2, 10, "second")];
        let config = RetrievalConfig {
            rerank_enabled: true,
            ..Default::default()
        };
        let service = service(hits, rows, Some(Arc::new(ReversingReranker)), config);

        let mut req = request("q");
        req.rerank = true;
        let retrieval = service.retrieve(&tenant(), &req).await.unwrap();
        let ids: Vec<i64> = retrieval.matches.iter().map(|m| m.chunk_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn empty_query_is_invalid() {
        let service = service(Vec::new(), Vec::new(), None, RetrievalConfig::default());
        let err = service
            .retrieve(&tenant(), &request("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidRequest(_)));
    }

    #[test]
    fn short_text_passes_through() {
        assert_eq!(make_snippet("A short one.", 300), "A short one.");
    }

    #[test]
    fn prefers_sentence_boundary() {
        let text = "First sentence is right here. Second sentence keeps going for quite a while after that.";
        let snippet = make_snippet(text, 40);
        assert_eq!(snippet, "First sentence is right here.");
    }

    #[test]
    fn falls_back_to_word_boundary() {
        let text = "no terminal punctuation in this stretch of words at all just words";
        let snippet = make_snippet(text, 30);
        assert!(snippet.ends_with('…'));
        assert!(snippet.chars().count() <= 31);
        assert!(!snippet.contains("stretch of words at all"));
    }

    #[test]
    fn never_splits_multibyte_chars() {
        let text = "données géographiques économétriques répétées encore et encore et encore";
        let snippet = make_snippet(text, 25);
        assert!(snippet.chars().count() <= 26);
    }

    #[test]
    fn token_count_of_snippet_is_positive() {
        let snippet = make_snippet("alpha beta gamma delta epsilon", 10);
        assert!(count_tokens(&snippet) > 0);
    }
}
