//! Relay service coordination
//!
//! Wires configuration, metrics, the session handler, the presence reaper,
//! and the HTTP/WebSocket server together, and owns their lifecycles.

use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::presence::PresenceReaper;
use crate::session::{RelayStats, SessionHandler};
use crate::transport::{RelayServer, RelayServerConfig};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Server error: {message}")]
    Server { message: String },
}

/// Running relay with all of its components
pub struct RelayService {
    config: AppConfig,

    handler: SessionHandler,

    metrics_collector: Arc<MetricsCollector>,

    server: Arc<RelayServer>,

    /// Server and reaper task handles
    background_tasks: Vec<JoinHandle<()>>,

    is_running: Arc<RwLock<bool>>,
}

impl RelayService {
    /// Build every component from configuration
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} relay service", config.service.name);

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let handler = SessionHandler::new(metrics_collector.clone());

        let server_config = RelayServerConfig {
            host: config.service.host.clone(),
            port: config.service.port,
            ws_path: config.service.ws_path.clone(),
            service_name: config.service.name.clone(),
        };
        let server = Arc::new(RelayServer::new(server_config, handler.clone()));

        Ok(Self {
            config,
            handler,
            metrics_collector,
            server,
            background_tasks: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Bind the configured address and start serving
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        let address = self.config.bind_address();
        let listener =
            TcpListener::bind(&address)
                .await
                .map_err(|e| ServiceError::Server {
                    message: format!("Failed to bind {}: {}", address, e),
                })?;

        self.start_with_listener(listener).await
    }

    /// Start serving on an already bound listener
    pub async fn start_with_listener(
        &mut self,
        listener: TcpListener,
    ) -> Result<(), ServiceError> {
        info!("Starting {} relay service", self.config.service.name);

        *self.is_running.write().await = true;

        let server = self.server.clone();
        let shutdown_rx = server.subscribe_shutdown();
        let is_running = self.is_running.clone();
        let server_task = tokio::spawn(async move {
            if let Err(e) = server.serve_until(listener, shutdown_rx).await {
                error!("Relay server failed: {}", e);
            }
            *is_running.write().await = false;
        });
        self.background_tasks.push(server_task);

        info!(
            "Starting presence reaper ({}ms interval, {}ms staleness)...",
            self.config.presence.reap_interval_ms, self.config.presence.stale_after_ms
        );
        let reaper = PresenceReaper::new(self.config.reap_interval(), self.config.stale_after());
        let reaper_shutdown_rx = self.server.subscribe_shutdown();
        self.background_tasks
            .push(reaper.spawn(self.handler.clone(), reaper_shutdown_rx));

        info!("✅ Relay service started");
        Ok(())
    }

    /// Stop accepting connections and wind down background tasks
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of relay service");

        *self.is_running.write().await = false;

        self.server.stop();
        self.stop_background_tasks().await;

        match self.handler.stats() {
            Ok(stats) => info!("Final relay statistics: {:?}", stats),
            Err(e) => warn!("Failed to read final statistics: {}", e),
        }

        info!("✅ Relay service shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn handler(&self) -> SessionHandler {
        self.handler.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn stats(&self) -> anyhow::Result<RelayStats> {
        self.handler.stats()
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        let timeout = self.config.shutdown_timeout();
        for (i, mut task) in self.background_tasks.drain(..).enumerate() {
            // Both tasks listen on the server's stop signal. The timeout only
            // bounds in-flight connections draining.
            match tokio::time::timeout(timeout, &mut task).await {
                Ok(_) => debug!("Background task {}/{} finished", i + 1, task_count),
                Err(_) => {
                    debug!("Aborting background task {}/{}", i + 1, task_count);
                    task.abort();
                }
            }
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.service.port = 0;

        match RelayService::new(config) {
            Err(ServiceError::Configuration { message }) => {
                assert!(message.contains("Port"));
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("invalid config accepted"),
        }
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut config = AppConfig::default();
        config.service.host = "127.0.0.1".to_string();
        config.service.shutdown_timeout_seconds = 1;

        let mut service = RelayService::new(config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        service.start_with_listener(listener).await.unwrap();
        assert!(service.is_running().await);

        service.shutdown().await.unwrap();
        assert!(!service.is_running().await);
        assert_eq!(service.stats().unwrap(), RelayStats::default());
    }

    #[tokio::test]
    async fn test_shutdown_does_not_wait_for_timeout() {
        let mut config = AppConfig::default();
        config.service.host = "127.0.0.1".to_string();
        config.service.shutdown_timeout_seconds = 3;

        let mut service = RelayService::new(config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        service.start_with_listener(listener).await.unwrap();

        let started = std::time::Instant::now();
        service.shutdown().await.unwrap();
        let elapsed = started.elapsed();

        assert!(
            elapsed < std::time::Duration::from_millis(500),
            "shutdown took {:?}",
            elapsed
        );
    }
}
