pub mod answer_routes;
pub mod chunk_routes;
pub mod health_routes;
pub mod ingest_routes;
pub mod query_routes;
pub mod ws_routes;

pub use answer_routes::answer_routes;
pub use chunk_routes::chunk_routes;
pub use health_routes::health_routes;
pub use ingest_routes::ingest_routes;
pub use query_routes::query_routes;
pub use ws_routes::ws_routes;
