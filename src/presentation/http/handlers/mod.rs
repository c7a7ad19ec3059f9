pub mod answer_handler;
pub mod chunk_handler;
pub mod ingest_handler;
pub mod query_handler;
pub mod ws_handler;

pub use answer_handler::AnswerHandler;
pub use chunk_handler::ChunkHandler;
pub use ingest_handler::IngestHandler;
pub use query_handler::QueryHandler;
pub use ws_handler::WsHandler;
