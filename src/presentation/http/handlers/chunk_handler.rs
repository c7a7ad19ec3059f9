use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use std::sync::Arc;

use crate::domain::repositories::ChunkRepository;
use crate::presentation::http::auth::AuthConfig;
use crate::presentation::http::dto::ChunkDto;
use crate::presentation::http::error::ApiError;

pub struct ChunkHandler {
    chunks: Arc<dyn ChunkRepository>,
    auth: Arc<AuthConfig>,
}

impl ChunkHandler {
    pub fn new(chunks: Arc<dyn ChunkRepository>, auth: Arc<AuthConfig>) -> Self {
        Self { chunks, auth }
    }

    /// Citation expansion: fetch one chunk's full text and breadcrumbs.
    pub async fn get_chunk(
        State(handler): State<Arc<ChunkHandler>>,
        headers: HeaderMap,
        Path(chunk_id): Path<i64>,
    ) -> Result<Json<ChunkDto>, ApiError> {
        let tenant = handler.auth.authenticate(&headers, None)?;
        let chunk = handler.chunks.get_for_tenant(&tenant, chunk_id).await?;
        Ok(Json(ChunkDto::from(chunk)))
    }
}
