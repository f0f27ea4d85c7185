//! Local HTTP server for finished outputs.

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `/health`, `/metrics` when a handle is given, and the output directory
/// under `/output`.
pub fn create_router(config: &WorkerConfig, metrics_handle: Option<PrometheusHandle>) -> Router {
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .route("/health", get(health))
        .merge(metrics_routes)
        .nest_service("/output", ServeDir::new(&config.output_dir))
        .layer(TraceLayer::new_for_http())
}

/// Serve until the task is dropped or the listener fails.
pub async fn serve(config: WorkerConfig, metrics_handle: Option<PrometheusHandle>) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Serving {} on http://{}/output",
        config.output_dir.display(),
        addr
    );

    axum::serve(listener, create_router(&config, metrics_handle))
        .await
        .map_err(|e| WorkerError::config_error(format!("HTTP server stopped: {}", e)))
}
