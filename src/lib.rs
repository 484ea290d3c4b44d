pub mod aggregate; // Weekday chart
pub mod api; // HTTP API for the pharmacy dashboard
pub mod board; // Optimistic list state
pub mod config;
pub mod crypto;
pub mod error;
pub mod joiner; // Status join
pub mod models;
pub mod normalizer;
pub mod search;
pub mod service; // Presentation boundary
pub mod store;
pub mod workflow; // Fulfillment state machine

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::PharmacyConfig;
use crate::error::StartupError;
use crate::service::PharmacyService;

/// Load configuration, then serve the API until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Before tracing init so RUST_LOG may come from .env
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, ".env file could not be read");
        }
    }

    let config = PharmacyConfig::from_env()?;
    serve(config, shutdown_signal()).await
}

/// Serve the API described by `config` until `shutdown` resolves.
pub async fn serve<F>(config: PharmacyConfig, shutdown: F) -> Result<(), StartupError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let service = Arc::new(PharmacyService::from_config(&config)?);

    let mut app = api::pharmacy_api_router(service);
    if let Some(origin) = &config.cors_origin {
        app = api::with_cors(app, origin);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Pharmacy API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Pharmacy API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl-C handler unavailable, running until killed");
        std::future::pending::<()>().await;
    }
}
