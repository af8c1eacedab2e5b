//! Standardizer Server
//!
//! Accepts an ideal workbook, a raw workbook and an instructions document,
//! asks a local model for a column mapping plan and serves the populated result.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use standardizer_server::{
    build_router,
    config::AppConfig,
    init_tracing,
    planner::OllamaModel,
    services::JobService,
    state::AppState,
    store::JobStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting standardizer server"
    );

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load app config, using defaults");
        AppConfig::default()
    });

    tracing::info!(
        host = %config.host,
        port = config.port,
        jobs_dir = %config.jobs_dir.display(),
        model = %config.model_name,
        "Configuration loaded"
    );

    let store = JobStore::new(&config.jobs_dir);
    store.init().await?;

    let model = OllamaModel::new(
        config.model_command.clone(),
        config.model_name.clone(),
        config.model_timeout(),
    );

    let config = Arc::new(config);
    let jobs = JobService::new(store, Arc::new(model), config.clone());
    let app = build_router(AppState::new(jobs, config.clone()));

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
