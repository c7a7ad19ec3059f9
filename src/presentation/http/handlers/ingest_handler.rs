use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::application::services::IngestService;
use crate::infrastructure::limits::{LimitDecision, TenantLimiter};
use crate::presentation::http::auth::AuthConfig;
use crate::presentation::http::dto::{DocumentStatusDto, IngestAcceptedDto, JobStatusDto};
use crate::presentation::http::error::ApiError;

pub struct IngestHandler {
    ingest: Arc<IngestService>,
    auth: Arc<AuthConfig>,
    limiter: Arc<TenantLimiter>,
}

impl IngestHandler {
    pub fn new(
        ingest: Arc<IngestService>,
        auth: Arc<AuthConfig>,
        limiter: Arc<TenantLimiter>,
    ) -> Self {
        Self {
            ingest,
            auth,
            limiter,
        }
    }

    pub async fn upload(
        State(handler): State<Arc<IngestHandler>>,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> Result<impl IntoResponse, ApiError> {
        let tenant = handler.auth.authenticate(&headers, None)?;
        if handler.limiter.check_request(&tenant) == LimitDecision::RateLimited {
            return Err(ApiError::RateLimited);
        }

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?
        {
            if field.name() != Some("file") {
                continue;
            }
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ApiError::Validation("file field needs a filename".to_string()))?;
            let mime = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(e.to_string()))?
                .to_vec();

            let (_, job) = handler
                .ingest
                .upload(&tenant, &file_name, mime.as_deref(), bytes)
                .await?;
            return Ok((
                StatusCode::ACCEPTED,
                Json(IngestAcceptedDto::from_job(&job)),
            ));
        }

        Err(ApiError::Validation(
            "multipart body must contain a 'file' field".to_string(),
        ))
    }

    pub async fn job_status(
        State(handler): State<Arc<IngestHandler>>,
        headers: HeaderMap,
        Path(job_id): Path<i64>,
    ) -> Result<Json<JobStatusDto>, ApiError> {
        let tenant = handler.auth.authenticate(&headers, None)?;
        let job = handler.ingest.job_status(&tenant, job_id).await?;
        Ok(Json(JobStatusDto::from(job)))
    }

    pub async fn document_status(
        State(handler): State<Arc<IngestHandler>>,
        headers: HeaderMap,
        Path(document_id): Path<i64>,
    ) -> Result<Json<DocumentStatusDto>, ApiError> {
        let tenant = handler.auth.authenticate(&headers, None)?;
        let (document, jobs) = handler.ingest.document_status(&tenant, document_id).await?;
        Ok(Json(DocumentStatusDto::new(document, jobs)))
    }
}
