use axum::{Router, routing::get};
use std::sync::Arc;

use crate::presentation::http::handlers::WsHandler;

pub fn ws_routes(handler: Arc<WsHandler>) -> Router {
    Router::new()
        .route("/ws", get(WsHandler::upgrade))
        .with_state(handler)
}
