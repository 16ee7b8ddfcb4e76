//! Stardust Engine Server - headless trading system
//!
//! Runs the Candle Aggregator, Resolution Fan-out, Engine Controller,
//! Trader and Backtest Runner as background tasks, and exposes the
//! algo/deployment/backtest management surface over HTTP.
//!
//! # Usage
//! ```sh
//! HTTP_PORT=8080 cargo run --bin stardust-server
//! ```

use anyhow::Result;
use stardust_engine::application::bootstrap;
use stardust_engine::config::Config;
use stardust_engine::interfaces::http;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("stardust-engine {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(bind = %config.http_bind_address, port = config.http_port, "configuration loaded");

    info!("building trading system...");
    let system = bootstrap::build(&config).await?;
    info!("trading system running");

    let router = http::router(&system, config.auth_token.clone());
    let addr = format!("{}:{}", config.http_bind_address, config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "http server listening");

    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(e) = result {
                tracing::error!("http server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    system.shutdown();
    Ok(())
}
