use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::application::services::answer::{AnswerEvent, AnswerService};
use crate::application::services::token::count_tokens;
use crate::domain::value_objects::TenantId;
use crate::infrastructure::limits::{LimitDecision, TenantLimiter};
use crate::presentation::http::auth::AuthConfig;
use crate::presentation::http::dto::{AnswerRequestDto, AnswerResponseDto};
use crate::presentation::http::error::ApiError;

pub struct AnswerHandler {
    answer: Arc<AnswerService>,
    auth: Arc<AuthConfig>,
    limiter: Arc<TenantLimiter>,
    max_tokens_default: i32,
}

impl AnswerHandler {
    pub fn new(
        answer: Arc<AnswerService>,
        auth: Arc<AuthConfig>,
        limiter: Arc<TenantLimiter>,
        max_tokens_default: i32,
    ) -> Self {
        Self {
            answer,
            auth,
            limiter,
            max_tokens_default,
        }
    }

    /// Admission control shared by both answer paths: request rate plus a
    /// token reservation sized from the query and the generation budget.
    fn admit(&self, headers: &HeaderMap, request: &AnswerRequestDto) -> Result<TenantId, ApiError> {
        let tenant = self.auth.authenticate(headers, None)?;
        if self.limiter.check_request(&tenant) == LimitDecision::RateLimited {
            return Err(ApiError::RateLimited);
        }
        let reserve = count_tokens(&request.query) as i64
            + request.max_tokens.unwrap_or(self.max_tokens_default) as i64;
        if self.limiter.check_tokens(&tenant, reserve) == LimitDecision::QuotaExhausted {
            return Err(ApiError::QuotaExceeded);
        }
        Ok(tenant)
    }

    pub async fn answer(
        State(handler): State<Arc<AnswerHandler>>,
        headers: HeaderMap,
        Json(request): Json<AnswerRequestDto>,
    ) -> Result<Json<AnswerResponseDto>, ApiError> {
        let tenant = handler.admit(&headers, &request)?;
        let response = handler.answer.answer(&tenant, &request.into()).await?;
        Ok(Json(AnswerResponseDto::from(response)))
    }

    /// SSE variant: `event: chunk` deltas, then exactly one terminal event,
    /// `done` or `error`.
    pub async fn answer_stream(
        State(handler): State<Arc<AnswerHandler>>,
        headers: HeaderMap,
        Json(request): Json<AnswerRequestDto>,
    ) -> Result<impl IntoResponse, ApiError> {
        let tenant = handler.admit(&headers, &request)?;
        let events = handler
            .answer
            .answer_stream(&tenant, &request.into())
            .await?;

        let sse_stream = events.map(|event| {
            let name = match &event {
                AnswerEvent::Chunk { .. } => "chunk",
                AnswerEvent::Done { .. } => "done",
                AnswerEvent::Error { .. } => "error",
            };
            let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
            Ok::<_, Infallible>(Event::default().event(name).data(data))
        });

        Ok(Sse::new(sse_stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        ))
    }
}
