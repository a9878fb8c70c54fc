//! Axum HTTP server for the REST API

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{Error, Result};

use super::handlers;

/// Shared state handed to every handler
pub struct ApiState {
    /// Raised by the supervisor once the controller loops run
    pub ready: Arc<AtomicBool>,
}

fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve health checks and metrics on `addr` until `shutdown` fires
pub async fn run_server(
    addr: SocketAddr,
    state: Arc<ApiState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;
    info!("REST API server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    info!("REST API server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_server_serves_health_checks_until_shutdown() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let ready = Arc::new(AtomicBool::new(true));
        let token = CancellationToken::new();
        let server = tokio::spawn(run_server(
            addr,
            Arc::new(ApiState {
                ready: ready.clone(),
            }),
            token.clone(),
        ));

        let client = reqwest::Client::new();
        let url = format!("http://{addr}/readyz");
        let mut status = None;
        for _ in 0..50 {
            if let Ok(resp) = client.get(&url).send().await {
                status = Some(resp.status());
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(status, Some(reqwest::StatusCode::OK));

        ready.store(false, Ordering::SeqCst);
        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        token.cancel();
        server.await.unwrap().unwrap();
    }
}
