use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use facembed_core::OnnxAnalyzerFactory;
use facembed_server::{create_app, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        addr = %config.bind_addr(),
        model_dir = %config.model_dir.display(),
        cors_origins = ?config.cors_origins,
        "facembed-server starting"
    );

    // Models are loaded per request; only warn here so the service can start
    // before the model pack is installed.
    let paths = config.model_paths();
    for path in [&paths.detection, &paths.recognition] {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "model file missing; embedding requests will fail");
        }
    }

    let factory = OnnxAnalyzerFactory::new(paths, config.intra_threads);
    let app = create_app(AppState::new(Arc::new(factory)), &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "facembed-server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("facembed-server shutting down");
    Ok(())
}
