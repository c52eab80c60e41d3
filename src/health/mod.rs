//! Health check endpoints

use crate::metrics::{self, GatewayMetrics};
use crate::shard::ShardState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub total_shards: u32,
    pub shards_tracked: usize,
    pub shards_ready: usize,
    /// Ready or resuming
    pub shards_healthy: usize,
    pub all_healthy: bool,
    pub events_received: u64,
}

/// Application state for health endpoints
#[derive(Clone)]
pub struct AppState {
    pub shard_state: ShardState,
    pub metrics: Option<Arc<GatewayMetrics>>,
}

/// Create the health check router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn readiness(state: &ShardState) -> ReadyResponse {
    ReadyResponse {
        ready: state.is_ready(),
        total_shards: state.total_shards(),
        shards_tracked: state.shard_count(),
        shards_ready: state.ready_shards(),
        shards_healthy: state.healthy_shards(),
        all_healthy: state.is_healthy(),
        events_received: state.total_events_received(),
    }
}

/// Readiness endpoint - returns 200 if at least one shard is ready
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = readiness(&state.shard_state);

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    metrics::set_shards_ready(state.shard_state.ready_shards());

    let body = state
        .metrics
        .as_ref()
        .map(|m| m.render())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
}
