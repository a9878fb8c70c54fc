//! HTTP handlers for the REST API

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use prometheus_client::encoding::text::encode;
use tracing::{error, instrument};

use super::dto::{HealthResponse, ReadinessResponse};
use super::server::ApiState;
use crate::controller::metrics::REGISTRY;

/// Liveness: the process is serving requests
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness: the cache is synced and the controller loops are running
#[instrument(skip(state))]
pub async fn readyz(
    State(state): State<Arc<ApiState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let ready = state.ready.load(Ordering::SeqCst);
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(ReadinessResponse { ready }))
}

/// Prometheus text exposition of the controller registry
pub async fn metrics() -> Result<String, StatusCode> {
    let mut buffer = String::new();
    encode(&mut buffer, &REGISTRY).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(buffer)
}
