//! Composition root: builds every adapter and service from `Settings` and
//! hands the wired handlers to the HTTP server. Provider selection happens
//! here, once, at startup.

use std::sync::Arc;

use crate::application::ports::{
    DocumentParser, EmbeddingProvider, EventBus, LlmProvider, ObjectStore, Reranker, VectorIndex,
};
use crate::application::services::answer::AnswerConfig;
use crate::application::services::chunker::Chunker;
use crate::application::services::{AnswerService, IngestService, RetrieverService};
use crate::domain::repositories::{
    ChunkRepository, DocumentRepository, ElementRepository, EmbeddingRepository, JobRepository,
    UsageRepository,
};
use crate::infrastructure::config::{ProviderKind, Settings};
use crate::infrastructure::database::repositories::{
    PgVectorIndex, PostgresChunkRepository, PostgresDocumentRepository,
    PostgresElementRepository, PostgresJobRepository, PostgresUsageRepository,
};
use crate::infrastructure::database::{create_connection_pool, run_migrations};
use crate::infrastructure::external_services::embeddings::remote::RemoteEmbeddingConfig;
use crate::infrastructure::external_services::embeddings::{
    LocalEmbeddingProvider, RemoteEmbeddingProvider,
};
use crate::infrastructure::external_services::llm::{
    HttpLlmConfig, HttpLlmProvider, LocalLlmProvider,
};
use crate::infrastructure::external_services::parsers::{CompositeParser, MimeBoundParser};
use crate::infrastructure::external_services::rerank::{HttpReranker, HttpRerankerConfig};
use crate::infrastructure::limits::TenantLimiter;
use crate::infrastructure::messaging::{BroadcastEventBus, JobRunner, JobRunnerConfig};
use crate::infrastructure::object_store::{LocalObjectStore, S3ObjectStore};
use crate::presentation::http::auth::AuthConfig;
use crate::presentation::http::handlers::ws_handler::WsConfig;
use crate::presentation::http::handlers::{
    AnswerHandler, ChunkHandler, IngestHandler, QueryHandler, WsHandler,
};

/// Deadline for embed and rerank calls; the LLM keeps its own configurable
/// timeout since streams legitimately run long.
const OUTBOUND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct AppContainer {
    pub ingest_handler: Arc<IngestHandler>,
    pub query_handler: Arc<QueryHandler>,
    pub answer_handler: Arc<AnswerHandler>,
    pub chunk_handler: Arc<ChunkHandler>,
    pub ws_handler: Arc<WsHandler>,
    pub job_runner: Arc<JobRunner>,
}

impl AppContainer {
    pub async fn new(settings: &Settings) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = create_connection_pool(&settings.db_url)?;
        run_migrations(&pool)?;

        // Repositories
        let documents: Arc<dyn DocumentRepository> =
            Arc::new(PostgresDocumentRepository::new(pool.clone()));
        let jobs: Arc<dyn JobRepository> = Arc::new(PostgresJobRepository::new(pool.clone()));
        let elements: Arc<dyn ElementRepository> =
            Arc::new(PostgresElementRepository::new(pool.clone()));
        let chunks: Arc<dyn ChunkRepository> = Arc::new(PostgresChunkRepository::new(pool.clone()));
        let vector_store = Arc::new(PgVectorIndex::new(pool.clone()));
        let embeddings: Arc<dyn EmbeddingRepository> = vector_store.clone();
        let index: Arc<dyn VectorIndex> = vector_store;
        let usage: Arc<dyn UsageRepository> = Arc::new(PostgresUsageRepository::new(pool));

        // Object store
        let store: Arc<dyn ObjectStore> = match &settings.s3 {
            Some(s3) => Arc::new(S3ObjectStore::new(s3.clone(), settings.max_upload_bytes)?),
            None => Arc::new(LocalObjectStore::new(
                settings.upload_dir.clone(),
                settings.max_upload_bytes,
            )),
        };

        // Parsing
        let composite = Arc::new(CompositeParser::new());
        let parser_port: Arc<dyn DocumentParser> =
            Arc::new(MimeBoundParser::new(composite.clone(), ""));

        // Providers
        let embedder: Arc<dyn EmbeddingProvider> = match settings.embed_provider {
            ProviderKind::Local => {
                LocalEmbeddingProvider::shared(settings.embed_dim, settings.embed_batch_size)
            }
            ProviderKind::Remote => Arc::new(RemoteEmbeddingProvider::new(
                RemoteEmbeddingConfig {
                    url: settings
                        .remote_embed_url
                        .clone()
                        .expect("checked at config load"),
                    token: settings.remote_embed_token.clone(),
                    dim: settings.embed_dim,
                    batch_size: settings.embed_batch_size,
                    max_retries: 3,
                    timeout: OUTBOUND_TIMEOUT,
                    backoff_base: settings.backoff_base,
                },
            )?),
        };

        let llm: Arc<dyn LlmProvider> = match settings.llm_provider {
            ProviderKind::Local => Arc::new(LocalLlmProvider::new(settings.llm_model.clone())),
            ProviderKind::Remote => Arc::new(HttpLlmProvider::new(HttpLlmConfig {
                url: settings.llm_url.clone().expect("checked at config load"),
                token: settings.llm_token.clone(),
                model: settings.llm_model.clone(),
                timeout: settings.llm_timeout,
            })?),
        };

        let reranker: Option<Arc<dyn Reranker>> =
            match (settings.rerank_enabled, &settings.rerank_url) {
                (true, Some(url)) => Some(Arc::new(HttpReranker::new(HttpRerankerConfig {
                    url: url.clone(),
                    token: settings.rerank_token.clone(),
                    timeout: OUTBOUND_TIMEOUT,
                })?)),
                _ => None,
            };

        // Bus, limits, auth
        let bus: Arc<dyn EventBus> = BroadcastEventBus::new(settings.ws_buffer_limit);
        let limiter = Arc::new(TenantLimiter::new(
            settings.rate_limit_per_min,
            settings.daily_token_quota,
        ));
        let auth = Arc::new(AuthConfig {
            require_auth: settings.require_auth,
            secret: settings.auth_secret.clone(),
        });

        // Services
        let ingest = Arc::new(IngestService::new(
            documents.clone(),
            jobs.clone(),
            store.clone(),
            parser_port,
            settings.max_upload_bytes,
        ));
        let retriever = Arc::new(RetrieverService::new(
            embedder.clone(),
            index,
            chunks.clone(),
            reranker,
            settings.retrieval.clone(),
        ));
        let answer = Arc::new(AnswerService::new(
            retriever.clone(),
            llm,
            usage,
            AnswerConfig {
                temperature_default: settings.llm_temperature,
                max_tokens_default: settings.llm_max_tokens,
                cache_ttl: settings.answer_cache_ttl,
            },
        ));

        // Background workers
        let job_runner = JobRunner::new(
            documents,
            jobs,
            elements,
            chunks.clone(),
            embeddings,
            store,
            composite,
            embedder,
            bus.clone(),
            Chunker::new(settings.chunker.clone()),
            JobRunnerConfig {
                max_attempts: settings.max_attempts,
                backoff_base: settings.backoff_base,
                backoff_max: settings.backoff_max,
                workers_per_kind: settings.workers_per_kind,
                poll_interval: std::time::Duration::from_millis(500),
            },
        );

        // HTTP handlers
        let ingest_handler = Arc::new(IngestHandler::new(ingest, auth.clone(), limiter.clone()));
        let query_handler = Arc::new(QueryHandler::new(
            retriever,
            auth.clone(),
            limiter.clone(),
        ));
        let answer_handler = Arc::new(AnswerHandler::new(
            answer,
            auth.clone(),
            limiter,
            settings.llm_max_tokens,
        ));
        let chunk_handler = Arc::new(ChunkHandler::new(chunks, auth.clone()));
        let ws_handler = Arc::new(WsHandler::new(
            bus,
            auth,
            WsConfig {
                ping_interval: settings.ping_interval,
                ping_timeout: settings.ping_timeout,
            },
        ));

        Ok(Self {
            ingest_handler,
            query_handler,
            answer_handler,
            chunk_handler,
            ws_handler,
            job_runner,
        })
    }
}
