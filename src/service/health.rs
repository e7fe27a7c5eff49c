//! Health reporting
//!
//! Builds the JSON report served on `/health` from the live relay state.

use crate::session::SessionHandler;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_seconds: u64,
    pub stats: ServiceStats,
}

/// Relay counters for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceStats {
    /// Registered connections
    pub connections: usize,
    /// Lobbies currently in the store
    pub lobbies: usize,
    /// Members across all lobbies
    pub members: usize,
}

impl HealthCheck {
    /// Inspect the relay state. A state that cannot be read reports unhealthy
    /// with zeroed counters rather than failing the request.
    pub fn check(service: &str, handler: &SessionHandler, started_at: Instant) -> Result<Self> {
        let (status, stats) = match handler.stats() {
            Ok(stats) => (
                HealthStatus::Healthy,
                ServiceStats {
                    connections: stats.connections,
                    lobbies: stats.lobbies,
                    members: stats.members,
                },
            ),
            Err(e) => {
                error!("Relay state inspection failed: {}", e);
                (HealthStatus::Unhealthy, ServiceStats::default())
            }
        };

        Ok(HealthCheck {
            status,
            service: service.to_string(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            uptime_seconds: started_at.elapsed().as_secs(),
            stats,
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
