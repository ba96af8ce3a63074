pub mod config;
pub mod pipeline;
pub mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pipeline::{
    start_worker, BatchQueue, BatchRunner, LlmCapabilities, QualityGate, WebhookSink,
    WorkerSettings,
};

/// Wire everything together and serve until the process is stopped.
///
/// The blocking HTTP clients (capabilities, webhook sink) are built
/// here, outside the async runtime; they only ever run on the worker
/// thread.
pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let app_config = config::AppConfig::from_env();
    tracing::info!(
        port = app_config.port,
        llm_base_url = %app_config.llm_base_url,
        llm_model = %app_config.llm_model,
        "Prospector starting v{}",
        config::SERVICE_VERSION
    );

    let queue = Arc::new(BatchQueue::new());

    let capabilities = LlmCapabilities::new(
        &app_config.llm_base_url,
        &app_config.llm_model,
        app_config.llm_api_key.clone(),
        app_config.llm_timeout_secs,
    );
    let runner = Arc::new(BatchRunner::new(
        Box::new(capabilities),
        QualityGate::new(app_config.gate_max_attempts),
    ));

    // Single consumer for the batch queue; joined on drop at shutdown.
    let _worker = start_worker(
        queue.clone(),
        runner,
        Arc::new(WebhookSink::new()),
        WorkerSettings {
            batch_pause: app_config.batch_pause,
            delivery_pause: app_config.delivery_pause,
        },
    );

    let state = server::AppState::new(queue, &app_config);
    let app = server::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(%addr, "Failed to bind listener: {e}");
                return;
            }
        };

        tracing::info!(%addr, "Prospector listening");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {e}");
        }
    });
}
