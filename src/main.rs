// =============================================================================
// coin-socket — Main Entry Point
// =============================================================================
//
// Streams Binance mini-ticker prices for a fixed allow-list of symbols and
// republishes them to dashboards over REST and WebSocket.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod market_data;
mod runtime_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::market_data::PriceFeed;
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("coin-socket starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();

    info!(
        symbols = ?config.symbols,
        seed_history = config.seed_history,
        sort = %config.default_sort,
        "Configured instruments"
    );

    // ── 2. Binance client & price feed ───────────────────────────────────
    let client = Arc::new(BinanceClient::new(config.rest_base_url.clone())?);
    info!(rest = %client.base_url(), stream = %config.stream_url, "Binance endpoints");
    let feed = PriceFeed::new(client.clone(), config.feed_config());

    // ── 3. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, client.rate_limits()));

    // ── 4. Presenter (owns the feed sessions) ────────────────────────────
    let presenter_state = state.clone();
    tokio::spawn(async move {
        app_state::run_presenter(presenter_state, move || feed.subscribe()).await;
    });

    // ── 5. API server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping");
    server.abort();

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("coin-socket shut down complete.");
    Ok(())
}
