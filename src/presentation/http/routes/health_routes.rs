use axum::{Json, Router, routing::get};
use serde_json::json;

pub fn health_routes() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(healthz))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
