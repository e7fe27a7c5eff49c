//! HTTP server hosting the relay
//!
//! Serves a plain-text liveness line on `/`, the WebSocket upgrade on the
//! configured path, a JSON health report on `/health`, and Prometheus metrics
//! on `/metrics`.

use crate::metrics::MetricsCollector;
use crate::service::health::HealthCheck;
use crate::session::SessionHandler;
use crate::transport::websocket::ws_handler;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    pub host: String,
    pub port: u16,
    /// Path that accepts WebSocket upgrades
    pub ws_path: String,
    /// Service name reported by the HTTP endpoints
    pub service_name: String,
}

impl Default for RelayServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            ws_path: "/ws".to_string(),
            service_name: "lobby-relay".to_string(),
        }
    }
}

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct ServerState {
    pub handler: SessionHandler,
    pub metrics_collector: Arc<MetricsCollector>,
    pub service_name: String,
    pub started_at: Instant,
}

/// Server that accepts relay connections
pub struct RelayServer {
    config: RelayServerConfig,
    state: ServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    pub fn new(config: RelayServerConfig, handler: SessionHandler) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = ServerState {
            metrics_collector: handler.metrics(),
            handler,
            service_name: config.service_name.clone(),
            started_at: Instant::now(),
        };

        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Bind and serve until [`RelayServer::stop`] is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid relay server address")?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.serve_until(listener, self.subscribe_shutdown()).await
    }

    /// Receiver that fires when [`RelayServer::stop`] is called
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Serve until `shutdown_rx` fires
    pub async fn serve_until(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let app = self.create_router();

        if let Ok(addr) = listener.local_addr() {
            info!(
                "Relay listening on http://{} (WebSocket path {})",
                addr, self.config.ws_path
            );
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Relay server shutdown signal received");
            })
            .await?;

        info!("Relay server stopped");
        Ok(())
    }

    /// Create the router with every relay endpoint
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route(&self.config.ws_path, get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
    }

    pub fn stop(&self) {
        info!("Stopping relay server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to relay server: {}", e);
        }
    }
}

async fn root_handler(State(state): State<ServerState>) -> impl IntoResponse {
    format!("{} ok\n", state.service_name)
}

async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    match HealthCheck::check(&state.service_name, &state.handler, state.started_at) {
        Ok(health) if health.is_healthy() => (StatusCode::OK, Json(json!(health))),
        Ok(health) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!(health))),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.service_name,
                    "version": crate::VERSION
                })),
            )
        }
    }
}

async fn metrics_handler(State(state): State<ServerState>) -> impl IntoResponse {
    debug!("Metrics endpoint requested");

    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            output,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain".to_string())],
                "Failed to encode metrics".to_string(),
            )
        }
    }
}
