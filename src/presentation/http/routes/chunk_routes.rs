use axum::{Router, routing::get};
use std::sync::Arc;

use crate::presentation::http::handlers::ChunkHandler;

pub fn chunk_routes(handler: Arc<ChunkHandler>) -> Router {
    Router::new()
        .route("/chunks/{chunk_id}", get(ChunkHandler::get_chunk))
        .with_state(handler)
}
