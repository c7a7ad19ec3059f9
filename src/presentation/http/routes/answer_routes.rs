use axum::{Router, routing::post};
use std::sync::Arc;

use crate::presentation::http::handlers::AnswerHandler;

pub fn answer_routes(handler: Arc<AnswerHandler>) -> Router {
    Router::new()
        .route("/answer", post(AnswerHandler::answer))
        .route("/answer/stream", post(AnswerHandler::answer_stream))
        .with_state(handler)
}
