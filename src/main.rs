use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clickgeo::api::{self, AppState};
use clickgeo::config::Config;
use clickgeo::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    info!("📡 Upstream metrics provider: {}", config.upstream.base_url);
    info!(
        "📊 Averaging window: {} {}(s)",
        config.window.units, config.window.unit
    );

    let state = Arc::new(AppState {
        upstream: UpstreamClient::new(config.upstream.clone()),
        window: config.window,
    });

    let api_router = api::create_api_router(state);

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind {api_addr}"))?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!(
        "   - Country metrics available at http://{}/v1/countries/metrics",
        api_addr
    );

    axum::serve(api_listener, api_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
