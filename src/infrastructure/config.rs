//! Environment-driven configuration. Every knob is read once at startup;
//! invalid combinations refuse to boot with a `ConfigError` (exit code 3).

use std::time::Duration;
use thiserror::Error;

use crate::application::services::chunker::ChunkerConfig;
use crate::application::services::retriever::RetrievalConfig;

/// Dimension of the `vector(1024)` column; `EMBED_DIM` must agree with it.
pub const INDEX_DIM: usize = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub port: u16,

    pub db_url: String,
    pub bus_url: Option<String>,

    pub s3: Option<S3Settings>,
    pub upload_dir: String,
    pub max_upload_bytes: u64,

    pub embed_provider: ProviderKind,
    pub embed_dim: usize,
    pub embed_batch_size: usize,
    pub remote_embed_url: Option<String>,
    pub remote_embed_token: Option<String>,

    pub llm_provider: ProviderKind,
    pub llm_url: Option<String>,
    pub llm_token: Option<String>,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub llm_max_tokens: i32,
    pub llm_temperature: f32,

    pub rerank_enabled: bool,
    pub rerank_url: Option<String>,
    pub rerank_token: Option<String>,

    pub retrieval: RetrievalConfig,
    pub chunker: ChunkerConfig,

    pub max_attempts: i32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub workers_per_kind: usize,

    pub rate_limit_per_min: u32,
    pub daily_token_quota: i64,
    pub answer_cache_ttl: Duration,

    pub ws_buffer_limit: usize,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,

    pub auth_secret: Option<String>,
    pub require_auth: bool,
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub bucket: String,
    pub key: String,
    pub secret: String,
    pub region: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_url = require("DB_URL")?;

        let s3 = match optional("S3_ENDPOINT") {
            Some(endpoint) => Some(S3Settings {
                endpoint,
                bucket: require("S3_BUCKET")?,
                key: require("S3_KEY")?,
                secret: require("S3_SECRET")?,
                region: optional("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            }),
            None => None,
        };

        let embed_provider = provider("EMBED_PROVIDER")?;
        let embed_dim = parse("EMBED_DIM", INDEX_DIM)?;
        if embed_dim != INDEX_DIM {
            return Err(ConfigError::Invalid {
                key: "EMBED_DIM",
                reason: format!("must match index schema dimension {}", INDEX_DIM),
            });
        }
        let remote_embed_url = optional("REMOTE_EMBED_URL");
        if embed_provider == ProviderKind::Remote && remote_embed_url.is_none() {
            return Err(ConfigError::Missing("REMOTE_EMBED_URL"));
        }

        let llm_provider = provider("LLM_PROVIDER")?;
        let llm_url = optional("LLM_URL");
        if llm_provider == ProviderKind::Remote && llm_url.is_none() {
            return Err(ConfigError::Missing("LLM_URL"));
        }

        let rerank_enabled = parse("RERANK_ENABLED", false)?;
        let rerank_url = optional("RERANK_URL");
        if rerank_enabled && rerank_url.is_none() {
            return Err(ConfigError::Missing("RERANK_URL"));
        }

        let require_auth = parse("REQUIRE_AUTH", true)?;
        let auth_secret = optional("AUTH_SECRET");
        if require_auth && auth_secret.is_none() {
            return Err(ConfigError::Missing("AUTH_SECRET"));
        }

        let max_ctx_cap = parse("MAX_CTX_CAP", 6000usize)?;
        let retrieval = RetrievalConfig {
            top_k_default: parse("TOP_K_DEFAULT", 10usize)?,
            top_k_max: parse("TOP_K_MAX", 50usize)?,
            max_ctx_tokens_default: parse("MAX_CTX_TOKENS", 2000usize)?.min(max_ctx_cap),
            max_ctx_cap,
            max_ctx_chunks: parse("MAX_CTX_CHUNKS", 6usize)?,
            snippet_max_chars: parse("SNIPPET_MAX_CHARS", 300usize)?,
            probes: optional("IVFFLAT_PROBES")
                .map(|v| {
                    v.parse::<i32>().map_err(|e| ConfigError::Invalid {
                        key: "IVFFLAT_PROBES",
                        reason: e.to_string(),
                    })
                })
                .transpose()?,
            rerank_enabled,
        };

        let max_tokens = parse("CHUNK_MAX_TOKENS", 700usize)?;
        let chunker = ChunkerConfig {
            min_tokens: parse("CHUNK_MIN_TOKENS", 350usize)?,
            max_tokens,
            overlap_tokens: parse("CHUNK_OVERLAP_TOKENS", max_tokens * 15 / 100)?,
            header_break_level: parse("CHUNK_HEADER_BREAK_LEVEL", 2i32)?,
            table_group_min_rows: parse("TABLE_GROUP_MIN_ROWS", 20usize)?,
            table_group_max_rows: parse("TABLE_GROUP_MAX_ROWS", 60usize)?,
        };
        if chunker.min_tokens >= chunker.max_tokens {
            return Err(ConfigError::Invalid {
                key: "CHUNK_MIN_TOKENS",
                reason: "must be below CHUNK_MAX_TOKENS".to_string(),
            });
        }

        Ok(Self {
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse("PORT", 8000u16)?,
            db_url,
            bus_url: optional("BUS_URL").or_else(|| optional("REDIS_URL")),
            s3,
            upload_dir: optional("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
            max_upload_bytes: parse("MAX_UPLOAD_BYTES", 250 * 1024 * 1024u64)?,
            embed_provider,
            embed_dim,
            embed_batch_size: parse("EMBED_BATCH_SIZE", 32usize)?,
            remote_embed_url,
            remote_embed_token: optional("REMOTE_EMBED_TOKEN"),
            llm_provider,
            llm_url,
            llm_token: optional("LLM_TOKEN"),
            llm_model: optional("LLM_MODEL").unwrap_or_else(|| "extractive-v1".to_string()),
            llm_timeout: Duration::from_secs(parse("LLM_TIMEOUT", 30u64)?),
            llm_max_tokens: parse("LLM_MAX_TOKENS", 1024i32)?,
            llm_temperature: parse("LLM_TEMPERATURE", 0.2f32)?,
            rerank_enabled,
            rerank_url,
            rerank_token: optional("RERANK_TOKEN"),
            retrieval,
            chunker,
            max_attempts: parse("MAX_ATTEMPTS", 3i32)?,
            backoff_base: Duration::from_millis(parse("BACKOFF_BASE_MS", 500u64)?),
            backoff_max: Duration::from_millis(parse("BACKOFF_MAX_MS", 60_000u64)?),
            workers_per_kind: parse("WORKERS_PER_KIND", 2usize)?,
            rate_limit_per_min: parse("RATE_LIMIT_PER_MIN", 60u32)?,
            daily_token_quota: parse("DAILY_TOKEN_QUOTA", 200_000i64)?,
            answer_cache_ttl: Duration::from_secs(parse("ANSWER_CACHE_TTL", 3600u64)?),
            ws_buffer_limit: parse("WS_BUFFER_LIMIT", 256usize)?,
            ping_interval: Duration::from_secs(parse("PING_INTERVAL", 20u64)?),
            ping_timeout: Duration::from_secs(parse("PING_TIMEOUT", 10u64)?),
            auth_secret,
            require_auth,
        })
    }
}

fn optional(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn parse<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn provider(key: &'static str) -> Result<ProviderKind, ConfigError> {
    match optional(key).as_deref() {
        None | Some("local") => Ok(ProviderKind::Local),
        Some("remote") => Ok(ProviderKind::Remote),
        Some(other) => Err(ConfigError::Invalid {
            key,
            reason: format!("expected 'local' or 'remote', got '{}'", other),
        }),
    }
}
