//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the lobby-relay service using
//! Prometheus metrics.

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Main metrics collector for the relay service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Connection-level metrics
    connection_metrics: ConnectionMetrics,

    /// Lobby-related metrics
    lobby_metrics: LobbyMetrics,

    /// Message-related metrics
    message_metrics: MessageMetrics,

    /// Presence reaper metrics
    presence_metrics: PresenceMetrics,
}

/// Connection-level metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Currently registered clients
    pub active_connections: IntGauge,

    /// Total connections accepted
    pub connections_total: IntCounter,

    /// Total outbound sends that failed
    pub send_failures_total: IntCounter,
}

/// Lobby-related metrics
#[derive(Clone)]
pub struct LobbyMetrics {
    /// Number of lobbies currently in the store
    pub active_lobbies: IntGauge,

    /// Sum of member counts across lobbies
    pub lobby_members: IntGauge,

    /// Total lobbies created
    pub lobbies_created_total: IntCounter,

    /// Total lobbies deleted after emptying
    pub lobbies_removed_total: IntCounter,

    /// Total lobby list broadcasts
    pub lobby_list_broadcasts_total: IntCounter,
}

/// Message-related metrics
#[derive(Clone)]
pub struct MessageMetrics {
    /// Inbound messages by type
    pub inbound_messages_total: IntCounterVec,

    /// Inbound frames dropped as malformed
    pub malformed_messages_total: IntCounter,

    /// Protocol errors reported to clients, by kind
    pub protocol_errors_total: IntCounterVec,

    /// Relay payloads handed to peer sinks
    pub relays_forwarded_total: IntCounter,
}

/// Presence reaper metrics
#[derive(Clone)]
pub struct PresenceMetrics {
    /// Reaper ticks executed
    pub reaper_ticks_total: IntCounter,

    /// Members evicted for staleness or missing connection
    pub members_reaped_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let connection_metrics = ConnectionMetrics::new(&registry)?;
        let lobby_metrics = LobbyMetrics::new(&registry)?;
        let message_metrics = MessageMetrics::new(&registry)?;
        let presence_metrics = PresenceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            connection_metrics,
            lobby_metrics,
            message_metrics,
            presence_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get connection metrics
    pub fn connection(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    /// Get lobby metrics
    pub fn lobby(&self) -> &LobbyMetrics {
        &self.lobby_metrics
    }

    /// Get message metrics
    pub fn message(&self) -> &MessageMetrics {
        &self.message_metrics
    }

    /// Get presence metrics
    pub fn presence(&self) -> &PresenceMetrics {
        &self.presence_metrics
    }

    /// Record a newly accepted connection
    pub fn record_connection(&self) {
        self.connection_metrics.connections_total.inc();
    }

    /// Record an inbound message that parsed successfully
    pub fn record_inbound(&self, message_type: &str) {
        self.message_metrics
            .inbound_messages_total
            .with_label_values(&[message_type])
            .inc();
    }

    /// Record a dropped malformed frame
    pub fn record_malformed(&self) {
        self.message_metrics.malformed_messages_total.inc();
    }

    /// Record a protocol error sent back to a client
    pub fn record_protocol_error(&self, kind: &str) {
        self.message_metrics
            .protocol_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record relay fan-out to `recipients` peers
    pub fn record_relay(&self, recipients: usize) {
        self.message_metrics
            .relays_forwarded_total
            .inc_by(recipients as u64);
    }

    /// Record a failed outbound send
    pub fn record_send_failure(&self) {
        self.connection_metrics.send_failures_total.inc();
    }

    /// Record a lobby being created
    pub fn record_lobby_created(&self) {
        self.lobby_metrics.lobbies_created_total.inc();
    }

    /// Record lobbies deleted after their last member left
    pub fn record_lobbies_removed(&self, count: usize) {
        self.lobby_metrics
            .lobbies_removed_total
            .inc_by(count as u64);
    }

    /// Record a lobby list broadcast
    pub fn record_lobby_list_broadcast(&self) {
        self.lobby_metrics.lobby_list_broadcasts_total.inc();
    }

    /// Record one reaper tick
    pub fn record_reaper_tick(&self, members_reaped: usize) {
        self.presence_metrics.reaper_ticks_total.inc();
        self.presence_metrics
            .members_reaped_total
            .inc_by(members_reaped as u64);
    }

    /// Update gauges from the current relay state
    pub fn update_gauges(&self, connections: usize, lobbies: usize, members: usize) {
        self.connection_metrics
            .active_connections
            .set(connections as i64);
        self.lobby_metrics.active_lobbies.set(lobbies as i64);
        self.lobby_metrics.lobby_members.set(members as i64);
    }
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_connections = IntGauge::new(
            "lobby_relay_active_connections",
            "Currently connected clients",
        )?;
        registry.register(Box::new(active_connections.clone()))?;

        let connections_total = IntCounter::new(
            "lobby_relay_connections_total",
            "Total connections accepted",
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let send_failures_total = IntCounter::new(
            "lobby_relay_send_failures_total",
            "Total outbound sends that failed",
        )?;
        registry.register(Box::new(send_failures_total.clone()))?;

        Ok(Self {
            active_connections,
            connections_total,
            send_failures_total,
        })
    }
}

impl LobbyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_lobbies =
            IntGauge::new("lobby_relay_active_lobbies", "Number of active lobbies")?;
        registry.register(Box::new(active_lobbies.clone()))?;

        let lobby_members = IntGauge::new(
            "lobby_relay_lobby_members",
            "Total members across all lobbies",
        )?;
        registry.register(Box::new(lobby_members.clone()))?;

        let lobbies_created_total = IntCounter::new(
            "lobby_relay_lobbies_created_total",
            "Total lobbies created",
        )?;
        registry.register(Box::new(lobbies_created_total.clone()))?;

        let lobbies_removed_total = IntCounter::new(
            "lobby_relay_lobbies_removed_total",
            "Total lobbies removed after their last member left",
        )?;
        registry.register(Box::new(lobbies_removed_total.clone()))?;

        let lobby_list_broadcasts_total = IntCounter::new(
            "lobby_relay_lobby_list_broadcasts_total",
            "Total lobby list broadcasts",
        )?;
        registry.register(Box::new(lobby_list_broadcasts_total.clone()))?;

        Ok(Self {
            active_lobbies,
            lobby_members,
            lobbies_created_total,
            lobbies_removed_total,
            lobby_list_broadcasts_total,
        })
    }
}

impl MessageMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let inbound_messages_total = IntCounterVec::new(
            Opts::new(
                "lobby_relay_inbound_messages_total",
                "Inbound messages by type",
            ),
            &["type"],
        )?;
        registry.register(Box::new(inbound_messages_total.clone()))?;

        let malformed_messages_total = IntCounter::new(
            "lobby_relay_malformed_messages_total",
            "Inbound frames dropped as malformed",
        )?;
        registry.register(Box::new(malformed_messages_total.clone()))?;

        let protocol_errors_total = IntCounterVec::new(
            Opts::new(
                "lobby_relay_protocol_errors_total",
                "Protocol errors reported to clients",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(protocol_errors_total.clone()))?;

        let relays_forwarded_total = IntCounter::new(
            "lobby_relay_relays_forwarded_total",
            "Relay payloads handed to peer sinks",
        )?;
        registry.register(Box::new(relays_forwarded_total.clone()))?;

        Ok(Self {
            inbound_messages_total,
            malformed_messages_total,
            protocol_errors_total,
            relays_forwarded_total,
        })
    }
}

impl PresenceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let reaper_ticks_total = IntCounter::new(
            "lobby_relay_reaper_ticks_total",
            "Presence reaper ticks executed",
        )?;
        registry.register(Box::new(reaper_ticks_total.clone()))?;

        let members_reaped_total = IntCounter::new(
            "lobby_relay_members_reaped_total",
            "Members evicted by the presence reaper",
        )?;
        registry.register(Box::new(members_reaped_total.clone()))?;

        Ok(Self {
            reaper_ticks_total,
            members_reaped_total,
        })
    }
}
