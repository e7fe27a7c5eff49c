//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! lobby-relay service, including environment variable and TOML file loading
//! and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub presence: PresenceSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and health reports
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface to bind the HTTP/WebSocket listener to
    pub host: String,
    /// Port for the HTTP/WebSocket listener
    pub port: u16,
    /// Path of the WebSocket upgrade endpoint
    pub ws_path: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Presence tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    /// Period of the presence reaper in milliseconds
    pub reap_interval_ms: u64,
    /// Heartbeat age after which a member is evicted, in milliseconds
    pub stale_after_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "lobby-relay".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8787,
            ws_path: "/ws".to_string(),
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            reap_interval_ms: 15_000,
            stale_after_ms: 45_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HOST") {
            self.service.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            self.service.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid PORT value: {}", port))?;
        }
        if let Ok(path) = env::var("WS_PATH") {
            self.service.ws_path = path;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Presence settings
        if let Ok(interval) = env::var("REAP_INTERVAL_MS") {
            self.presence.reap_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid REAP_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(stale) = env::var("STALE_AFTER_MS") {
            self.presence.stale_after_ms = stale
                .parse()
                .map_err(|_| anyhow!("Invalid STALE_AFTER_MS value: {}", stale))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get reaper period as Duration
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.presence.reap_interval_ms)
    }

    /// Get heartbeat staleness threshold as Duration
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.presence.stale_after_ms)
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.host.is_empty() {
        return Err(anyhow!("Host cannot be empty"));
    }
    if config.service.port == 0 {
        return Err(anyhow!("Port cannot be 0"));
    }
    if !config.service.ws_path.starts_with('/') {
        return Err(anyhow!(
            "WebSocket path must start with '/': {}",
            config.service.ws_path
        ));
    }
    if matches!(config.service.ws_path.as_str(), "/" | "/health" | "/metrics") {
        return Err(anyhow!(
            "WebSocket path conflicts with a built-in route: {}",
            config.service.ws_path
        ));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate presence settings
    if config.presence.reap_interval_ms == 0 {
        return Err(anyhow!("Reap interval must be greater than 0"));
    }
    if config.presence.stale_after_ms == 0 {
        return Err(anyhow!("Stale threshold must be greater than 0"));
    }
    if config.presence.stale_after_ms < config.presence.reap_interval_ms {
        return Err(anyhow!(
            "Stale threshold ({}ms) cannot be shorter than the reap interval ({}ms)",
            config.presence.stale_after_ms,
            config.presence.reap_interval_ms
        ));
    }

    Ok(())
}
