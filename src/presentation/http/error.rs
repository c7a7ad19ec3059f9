//! One error surface for the HTTP boundary: every internal error kind maps
//! onto a status code and a small JSON body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::application::ports::StorageError;
use crate::application::services::answer::AnswerError;
use crate::application::services::ingest::IngestError;
use crate::application::services::retriever::RetrievalError;
use crate::domain::repositories::RepositoryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("missing tenant")]
    MissingTenant,

    #[error("{0} not found")]
    NotFound(String),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("daily token quota exhausted")]
    QuotaExceeded,

    #[error("{0}")]
    Unavailable(String),

    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::MissingTenant => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::RateLimited | ApiError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "auth_error",
            ApiError::MissingTenant => "missing_tenant",
            ApiError::NotFound(_) => "not_found",
            ApiError::PayloadTooLarge => "payload_too_large",
            ApiError::UnsupportedMedia(_) => "unsupported_media_type",
            ApiError::RateLimited => "rate_limited",
            ApiError::QuotaExceeded => "quota_exceeded",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!(detail = %detail, "internal error surfaced to client");
        }
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound { entity, .. } => ApiError::NotFound(entity.to_string()),
            RepositoryError::Unavailable(m) => ApiError::Unavailable(m),
            RepositoryError::Conflict(m) | RepositoryError::Corrupt(m) => ApiError::Internal(m),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::UnsupportedMime(mime) => ApiError::UnsupportedMedia(mime),
            IngestError::PayloadTooLarge { .. } => ApiError::PayloadTooLarge,
            IngestError::Storage(StorageError::PayloadTooLarge { .. }) => ApiError::PayloadTooLarge,
            IngestError::Storage(StorageError::NotFound(uri)) => ApiError::NotFound(uri),
            IngestError::Storage(StorageError::Unavailable(m)) => ApiError::Unavailable(m),
            IngestError::Repository(e) => e.into(),
        }
    }
}

impl From<RetrievalError> for ApiError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::InvalidRequest(m) => ApiError::Validation(m),
            RetrievalError::Unavailable(m) => ApiError::Unavailable(m),
        }
    }
}

impl From<AnswerError> for ApiError {
    fn from(e: AnswerError) -> Self {
        match e {
            AnswerError::Retrieval(e) => e.into(),
            AnswerError::Llm(e) => ApiError::Unavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ApiError::UnsupportedMedia("video/mp4".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::Unavailable("index down".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn retrieval_failure_maps_to_503() {
        let api: ApiError = RetrievalError::Unavailable("embedder down".into()).into();
        assert_eq!(api.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn repository_not_found_maps_to_404() {
        let api: ApiError = RepositoryError::NotFound {
            entity: "chunk",
            id: 9,
        }
        .into();
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
    }
}
