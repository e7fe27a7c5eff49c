//! Metrics for the lobby relay
//!
//! Prometheus counters and gauges grouped by concern. The registry is served
//! on `/metrics` by the transport layer.

pub mod collector;

pub use collector::{
    ConnectionMetrics, LobbyMetrics, MessageMetrics, MetricsCollector, PresenceMetrics,
};
