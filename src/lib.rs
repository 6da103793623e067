//! floodwatch -- volumetric traffic anomaly detection.
//!
//! This crate provides the detection pipeline (rolling z-scores fused with
//! hard thresholds, consecutive-hit hysteresis, incident grouping) together
//! with SQLite persistence, a synthetic traffic producer and an HTTP
//! dashboard.

pub mod analysis;
pub mod api;
pub mod collector;
pub mod config;
pub mod detect;
pub mod service;
pub mod storage;

use anyhow::{Context, Result};

use crate::config::AppConfig;

/// Start the floodwatch daemon: producer, analyzer and API server.
pub async fn serve(config: AppConfig) -> Result<()> {
    // 1. Initialize Storage
    let db_path = config.storage.db_path.display().to_string();
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(&config.storage.db_path)?;

    // 2. Start background loops
    let producer = tokio::spawn(service::run_producer_loop(
        pool.clone(),
        config.collector.clone(),
    ));
    let analyzer = tokio::spawn(service::run_analysis_loop(
        pool.clone(),
        config.detector.clone(),
        config.analysis.clone(),
    ));

    // 3. Start API Server
    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    let mut state = api::state::AppState::new(pool);
    state.refresh_ms = config.analysis.interval_ms;
    let app = api::router(state);

    tracing::info!(%addr, "floodwatch listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    producer.abort();
    analyzer.abort();
    tracing::info!("floodwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
