use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use labscan::config::{self, ServerConfig};
use labscan::pipeline::{ExtractionError, OcrEngine};
use labscan::server::start_report_server;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let engine = match build_engine() {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Cannot initialize OCR engine: {e}");
            std::process::exit(1);
        }
    };

    let mut server = match start_report_server(ServerConfig::from_env(), engine).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Cannot start report server: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(url = %server.session.url, "Upload page ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }

    server.shutdown();
    server.wait().await;
}

#[cfg(feature = "ocr")]
fn build_engine() -> Result<Arc<dyn OcrEngine>, ExtractionError> {
    use labscan::pipeline::BundledTesseract;

    let engine = BundledTesseract::new(&config::tessdata_dir())?
        .with_languages(&config::ocr_languages());
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "ocr"))]
fn build_engine() -> Result<Arc<dyn OcrEngine>, ExtractionError> {
    Err(ExtractionError::OcrUnavailable)
}
