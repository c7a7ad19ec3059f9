use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::Instant;

use crate::application::services::retriever::{RetrievalRequest, RetrieverService};
use crate::infrastructure::limits::{LimitDecision, TenantLimiter};
use crate::presentation::http::auth::AuthConfig;
use crate::presentation::http::dto::{QueryRequestDto, QueryResponseDto, QueryUsageDto};
use crate::presentation::http::error::ApiError;

pub struct QueryHandler {
    retriever: Arc<RetrieverService>,
    auth: Arc<AuthConfig>,
    limiter: Arc<TenantLimiter>,
}

impl QueryHandler {
    pub fn new(
        retriever: Arc<RetrieverService>,
        auth: Arc<AuthConfig>,
        limiter: Arc<TenantLimiter>,
    ) -> Self {
        Self {
            retriever,
            auth,
            limiter,
        }
    }

    pub async fn query(
        State(handler): State<Arc<QueryHandler>>,
        headers: HeaderMap,
        Json(request): Json<QueryRequestDto>,
    ) -> Result<Json<QueryResponseDto>, ApiError> {
        let tenant = handler.auth.authenticate(&headers, None)?;
        if handler.limiter.check_request(&tenant) == LimitDecision::RateLimited {
            return Err(ApiError::RateLimited);
        }

        let started = Instant::now();
        let retrieval = handler
            .retriever
            .retrieve(
                &tenant,
                &RetrievalRequest {
                    query: request.query,
                    top_k: request.top_k,
                    rerank: request.rerank,
                    max_ctx_tokens: request.max_ctx,
                },
            )
            .await?;

        Ok(Json(QueryResponseDto {
            usage: QueryUsageDto {
                context_tokens: retrieval.context_tokens,
                latency_ms: started.elapsed().as_millis() as i64,
            },
            matches: retrieval.matches,
        }))
    }
}
