use axum::{Router, routing::post};
use std::sync::Arc;

use crate::presentation::http::handlers::QueryHandler;

pub fn query_routes(handler: Arc<QueryHandler>) -> Router {
    Router::new()
        .route("/query", post(QueryHandler::query))
        .with_state(handler)
}
