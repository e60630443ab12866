// query-gateway/src/main.rs

//! Query gateway binary.
//!
//! This binary exposes instance-tracking queries over HTTP so a display
//! layer can start, poll, and abort them:
//!
//! - `GET /health`
//! - `POST /queries`
//! - `GET /queries/{id}`
//! - `POST /queries/{id}/abort`
//!
//! Queries run in the background against the ledger nodes named by
//! `TRACKER_ROSTER`. A Prometheus exporter is started on `/metrics` when
//! `TRACKER_METRICS_ADDR` is set.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use tracker::{
    HttpLedgerClient, LedgerPort, MetricsRegistry, QueryEngine, TrackerConfig,
    run_prometheus_http_server,
};
use config::ApiConfig;
use routes::{health, queries};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "query_gateway=info,tracker=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::from_env()?;
    let tracker_cfg = TrackerConfig::from_env().map_err(|e| e.to_string())?;

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if tracker_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = tracker_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Ledger client + engine
    // ---------------------------

    let client = HttpLedgerClient::new(
        tracker_cfg.ledger.roster.clone(),
        tracker_cfg.ledger.genesis,
        tracker_cfg.ledger.timeout,
    )
    .map_err(|e| format!("failed to create ledger client: {e}"))?;
    tracing::info!(
        node = client.leader().unwrap_or_default(),
        genesis = %tracker_cfg.ledger.genesis,
        "using ledger node"
    );

    let port: Arc<dyn LedgerPort> = Arc::new(client);
    let engine = QueryEngine::new(port, tracker_cfg.query.clone())
        .with_metrics(metrics.query.clone());

    let app_state: SharedState = Arc::new(AppState::new(engine, api_cfg.max_finished_queries));

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/queries", post(queries::start_query))
        .route("/queries/{id}", get(queries::query_status))
        .route("/queries/{id}/abort", post(queries::abort_query))
        .with_state(app_state.clone());

    tracing::info!("query gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C, then stops every running query.
async fn shutdown_signal(state: SharedState) {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    state.abort_all().await;
}
