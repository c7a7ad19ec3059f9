use axum::{Router, routing::get, routing::post};
use std::sync::Arc;

use crate::presentation::http::handlers::IngestHandler;

pub fn ingest_routes(handler: Arc<IngestHandler>) -> Router {
    Router::new()
        .route("/ingest", post(IngestHandler::upload))
        .route("/ingest/{job_id}", get(IngestHandler::job_status))
        .route(
            "/ingest/document/{document_id}",
            get(IngestHandler::document_status),
        )
        .with_state(handler)
}
