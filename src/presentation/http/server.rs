use axum::Router;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::infrastructure::messaging::JobRunner;
use crate::presentation::http::handlers::{
    AnswerHandler, ChunkHandler, IngestHandler, QueryHandler, WsHandler,
};
use crate::presentation::http::routes::{
    answer_routes, chunk_routes, health_routes, ingest_routes, query_routes, ws_routes,
};

pub struct HttpServer {
    ingest_handler: Arc<IngestHandler>,
    query_handler: Arc<QueryHandler>,
    answer_handler: Arc<AnswerHandler>,
    chunk_handler: Arc<ChunkHandler>,
    ws_handler: Arc<WsHandler>,
    job_runner: Arc<JobRunner>,
    bind_addr: String,
    port: u16,
    body_limit: usize,
}

impl HttpServer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ingest_handler: Arc<IngestHandler>,
        query_handler: Arc<QueryHandler>,
        answer_handler: Arc<AnswerHandler>,
        chunk_handler: Arc<ChunkHandler>,
        ws_handler: Arc<WsHandler>,
        job_runner: Arc<JobRunner>,
        bind_addr: String,
        port: u16,
        body_limit: usize,
    ) -> Self {
        Self {
            ingest_handler,
            query_handler,
            answer_handler,
            chunk_handler,
            ws_handler,
            job_runner,
            bind_addr,
            port,
            body_limit,
        }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        // Workers run in-process alongside the API; they talk to it only
        // through the metadata store and the event bus.
        let _worker_handles = self.job_runner.start();

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .merge(health_routes())
            .merge(ingest_routes(self.ingest_handler))
            .merge(query_routes(self.query_handler))
            .merge(answer_routes(self.answer_handler))
            .merge(chunk_routes(self.chunk_handler))
            .merge(ws_routes(self.ws_handler))
            .layer(cors)
            .layer(RequestBodyLimitLayer::new(self.body_limit))
            .layer(TraceLayer::new_for_http());

        let addr: SocketAddr = format!("{}:{}", self.bind_addr, self.port).parse()?;
        info!(%addr, "listening");
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}
