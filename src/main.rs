use tracing::error;
use tracing_subscriber::EnvFilter;

use tessera::infrastructure::config::Settings;
use tessera::infrastructure::container::AppContainer;
use tessera::presentation::http::server::HttpServer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "configuration invalid, refusing to start");
            std::process::exit(3);
        }
    };

    let container = match AppContainer::new(&settings).await {
        Ok(container) => container,
        Err(e) => {
            error!(error = %e, "startup failed");
            std::process::exit(4);
        }
    };

    let server = HttpServer::new(
        container.ingest_handler,
        container.query_handler,
        container.answer_handler,
        container.chunk_handler,
        container.ws_handler,
        container.job_runner,
        settings.bind_addr.clone(),
        settings.port,
        settings.max_upload_bytes as usize,
    );

    if let Err(e) = server.run().await {
        error!(error = %e, "server exited with error");
        std::process::exit(4);
    }
}
