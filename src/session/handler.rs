//! Session protocol handler
//!
//! Interprets inbound client messages against the connection registry and
//! the lobby store. Both live in a single [`RelayState`] behind one mutex, and
//! the lock is held for the full handling of a message, a disconnect, or a
//! presence sweep, so no partial update is ever observable. Outbound sends go
//! into non-blocking sinks while the lock is held, which keeps per-client
//! delivery order identical to mutation order.

use crate::error::{RelayError, Result};
use crate::lobby::{LobbyStore, ReapOutcome};
use crate::metrics::MetricsCollector;
use crate::protocol::{InboundCommand, OutboundMessage};
use crate::registry::{ConnectionRegistry, SharedSink};
use crate::types::{ClientId, LobbyId, LobbyListing};
use crate::utils::{current_timestamp, generate_client_id};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared mutable state of the relay
#[derive(Default)]
pub struct RelayState {
    pub registry: ConnectionRegistry,
    pub lobbies: LobbyStore,
}

/// Where a connection stands in the protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    InLobby(LobbyId),
}

/// Per-connection session data
#[derive(Debug)]
pub struct Session {
    client_id: ClientId,
    current_lobby_id: Option<LobbyId>,
}

impl Session {
    fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            current_lobby_id: None,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn current_lobby_id(&self) -> Option<&str> {
        self.current_lobby_id.as_deref()
    }

    pub fn state(&self) -> SessionState {
        match &self.current_lobby_id {
            Some(lobby_id) => SessionState::InLobby(lobby_id.clone()),
            None => SessionState::Connected,
        }
    }
}

/// Point-in-time counters for health reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub connections: usize,
    pub lobbies: usize,
    pub members: usize,
}

/// Message-driven mutator of the relay state
#[derive(Clone)]
pub struct SessionHandler {
    state: Arc<Mutex<RelayState>>,
    metrics: Arc<MetricsCollector>,
}

impl SessionHandler {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState::default())),
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    fn lock_state(&self) -> std::result::Result<MutexGuard<'_, RelayState>, RelayError> {
        self.state.lock().map_err(|_| RelayError::InternalError {
            message: "Failed to acquire relay state lock".to_string(),
        })
    }

    /// Register a new connection and greet it with its client ID
    pub fn connect(&self, sink: SharedSink) -> Result<Session> {
        let mut state = self.lock_state()?;

        let mut client_id = generate_client_id();
        while state.registry.contains(&client_id) {
            client_id = generate_client_id();
        }

        state.registry.register(client_id.clone(), sink);
        self.metrics.record_connection();
        self.refresh_gauges(&state);

        self.unicast(
            &state,
            &client_id,
            OutboundMessage::Hello {
                client_id: client_id.clone(),
            },
        );

        info!(
            "Client connected - client_id: '{}', connections: {}",
            client_id,
            state.registry.len()
        );
        Ok(Session::new(client_id))
    }

    /// Handle one raw inbound frame. Malformed frames are dropped silently.
    pub fn handle_message(&self, session: &mut Session, raw: &[u8]) -> Result<()> {
        match InboundCommand::from_bytes(raw) {
            Some(command) => self.handle_command(session, command),
            None => {
                self.metrics.record_malformed();
                debug!(
                    "Dropped malformed frame - client_id: '{}', size: {} bytes",
                    session.client_id,
                    raw.len()
                );
                Ok(())
            }
        }
    }

    /// Apply a parsed command for this session
    pub fn handle_command(&self, session: &mut Session, command: InboundCommand) -> Result<()> {
        self.metrics.record_inbound(command.message_type());
        debug!(
            "Handling '{}' from client '{}'",
            command.message_type(),
            session.client_id
        );

        let mut state = self.lock_state()?;
        let now = current_timestamp();

        match command {
            InboundCommand::Hello => {
                self.unicast(
                    &state,
                    &session.client_id,
                    OutboundMessage::Hello {
                        client_id: session.client_id.clone(),
                    },
                );
            }
            InboundCommand::ListLobbies => {
                self.broadcast_lobby_list(&state);
            }
            InboundCommand::CreateLobby {
                display_name,
                game_version,
            } => {
                self.create_lobby(&mut state, session, display_name, game_version, now);
            }
            InboundCommand::JoinLobby { lobby_id } => {
                self.join_lobby(&mut state, session, lobby_id, now);
            }
            InboundCommand::LeaveLobby { lobby_id } => {
                self.leave_lobby(&mut state, session, lobby_id);
            }
            InboundCommand::Heartbeat => {
                if let Some(lobby_id) = &session.current_lobby_id {
                    state.lobbies.touch(lobby_id, &session.client_id, now);
                }
            }
            InboundCommand::Relay { lobby_id, payload } => {
                self.relay(&mut state, session, &lobby_id, payload, now);
            }
            InboundCommand::Unknown { message_type } => {
                debug!(
                    "Ignoring unrecognized message type '{}' from client '{}'",
                    message_type, session.client_id
                );
            }
        }

        Ok(())
    }

    fn create_lobby(
        &self,
        state: &mut RelayState,
        session: &mut Session,
        display_name: String,
        game_version: String,
        now: DateTime<Utc>,
    ) {
        // A client belongs to at most one lobby
        if let Some(previous) = session.current_lobby_id.take() {
            state.lobbies.leave(&previous, &session.client_id);
        }

        let summary = state
            .lobbies
            .create(display_name, game_version, session.client_id.clone(), now);
        session.current_lobby_id = Some(summary.lobby_id.clone());
        self.metrics.record_lobby_created();
        self.remove_empty_lobbies(state);

        info!(
            "Lobby created - lobby_id: {}, name: '{}', version: '{}', host: '{}'",
            summary.lobby_id, summary.display_name, summary.game_version, session.client_id
        );

        self.unicast(
            state,
            &session.client_id,
            OutboundMessage::JoinedLobby { lobby: summary },
        );
        self.broadcast_lobby_list(state);
    }

    fn join_lobby(
        &self,
        state: &mut RelayState,
        session: &mut Session,
        lobby_id: LobbyId,
        now: DateTime<Utc>,
    ) {
        if !state.lobbies.contains(&lobby_id) {
            let error = RelayError::LobbyNotFound { lobby_id };
            self.reject(state, session, &error);
            return;
        }

        if let Some(previous) = session.current_lobby_id.take() {
            if previous != lobby_id {
                state.lobbies.leave(&previous, &session.client_id);
            }
        }

        match state.lobbies.join(&lobby_id, &session.client_id, now) {
            Ok(summary) => {
                session.current_lobby_id = Some(lobby_id);
                self.remove_empty_lobbies(state);

                info!(
                    "Client '{}' joined lobby {} - members: {}",
                    session.client_id, summary.lobby_id, summary.members
                );

                self.unicast(
                    state,
                    &session.client_id,
                    OutboundMessage::JoinedLobby { lobby: summary },
                );
                self.broadcast_lobby_list(state);
            }
            Err(error) => self.reject(state, session, &error),
        }
    }

    fn leave_lobby(
        &self,
        state: &mut RelayState,
        session: &mut Session,
        requested: Option<LobbyId>,
    ) {
        let lobby_id = requested
            .or_else(|| session.current_lobby_id.clone())
            .unwrap_or_default();

        if !state.lobbies.contains(&lobby_id) {
            debug!(
                "Leave ignored - client '{}' named unknown lobby '{}'",
                session.client_id, lobby_id
            );
            return;
        }

        let was_member = state.lobbies.leave(&lobby_id, &session.client_id);
        if session.current_lobby_id.as_deref() == Some(lobby_id.as_str()) {
            session.current_lobby_id = None;
        }
        self.remove_empty_lobbies(state);

        info!(
            "Client '{}' left lobby {} (was member: {})",
            session.client_id, lobby_id, was_member
        );
        self.broadcast_lobby_list(state);
    }

    fn relay(
        &self,
        state: &mut RelayState,
        session: &Session,
        lobby_id: &str,
        payload: Option<Value>,
        now: DateTime<Utc>,
    ) {
        let is_member = match state.lobbies.get(lobby_id) {
            Some(lobby) => lobby.is_member(&session.client_id),
            None => {
                let error = RelayError::LobbyNotFound {
                    lobby_id: lobby_id.to_string(),
                };
                self.reject(state, session, &error);
                return;
            }
        };

        if !is_member {
            let error = RelayError::NotMember {
                lobby_id: lobby_id.to_string(),
                client_id: session.client_id.clone(),
            };
            self.reject(state, session, &error);
            return;
        }

        state.lobbies.touch(lobby_id, &session.client_id, now);

        let message = OutboundMessage::Relay { payload };
        let mut recipients = 0;
        for member in state.lobbies.snapshot_members(lobby_id) {
            if member == session.client_id {
                continue;
            }
            if self.unicast(state, &member, message.clone()) {
                recipients += 1;
            }
        }

        self.metrics.record_relay(recipients);
        debug!(
            "Relayed payload from '{}' in lobby {} to {} peers",
            session.client_id, lobby_id, recipients
        );
    }

    /// Tear down a session after its transport closed
    pub fn disconnect(&self, session: Session) -> Result<()> {
        let mut state = self.lock_state()?;

        state.registry.unregister(&session.client_id);
        if let Some(lobby_id) = &session.current_lobby_id {
            state.lobbies.leave(lobby_id, &session.client_id);
        }
        self.remove_empty_lobbies(&mut state);

        info!(
            "Client disconnected - client_id: '{}', lobby: {:?}, connections: {}",
            session.client_id,
            session.current_lobby_id,
            state.registry.len()
        );

        self.broadcast_lobby_list(&state);
        Ok(())
    }

    /// Run one presence sweep, broadcasting at most one lobby list
    pub fn sweep_presence(
        &self,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<ReapOutcome> {
        let mut guard = self.lock_state()?;
        let state = &mut *guard;

        let registry = &state.registry;
        let outcome = state
            .lobbies
            .reap_stale(now, stale_after, |client_id| registry.contains(client_id));

        self.metrics.record_reaper_tick(outcome.evicted.len());
        self.metrics
            .record_lobbies_removed(outcome.removed_lobbies.len());

        if outcome.changed() {
            info!(
                "Presence sweep - evicted {} members, removed {} lobbies",
                outcome.evicted.len(),
                outcome.removed_lobbies.len()
            );
            self.refresh_gauges(state);
            self.broadcast_lobby_list(state);
        } else {
            debug!("Presence sweep completed - no stale members");
        }

        Ok(outcome)
    }

    /// Current lobby list snapshot
    pub fn list_lobbies(&self) -> Result<Vec<LobbyListing>> {
        let state = self.lock_state()?;
        Ok(state.lobbies.list())
    }

    /// Current connection and lobby counters
    pub fn stats(&self) -> Result<RelayStats> {
        let state = self.lock_state()?;
        Ok(RelayStats {
            connections: state.registry.len(),
            lobbies: state.lobbies.len(),
            members: state.lobbies.member_total(),
        })
    }

    fn reject(&self, state: &RelayState, session: &Session, error: &RelayError) {
        self.metrics.record_protocol_error(error.kind());
        debug!(
            "Rejected request from client '{}': {:?}",
            session.client_id, error
        );
        self.unicast(state, &session.client_id, OutboundMessage::error(error));
    }

    fn remove_empty_lobbies(&self, state: &mut RelayState) {
        let removed = state.lobbies.remove_empty();
        if !removed.is_empty() {
            info!("Removed {} empty lobbies", removed.len());
            self.metrics.record_lobbies_removed(removed.len());
        }
        self.refresh_gauges(state);
    }

    /// Best-effort send to one client. Returns true if the sink accepted it.
    fn unicast(&self, state: &RelayState, client_id: &str, message: OutboundMessage) -> bool {
        let Some(sink) = state.registry.lookup(client_id) else {
            debug!(
                "Dropping '{}' for unreachable client '{}'",
                message.message_type(),
                client_id
            );
            return false;
        };

        match sink.deliver(message) {
            Ok(()) => true,
            Err(e) => {
                self.metrics.record_send_failure();
                warn!("Send to client '{}' failed: {}", client_id, e);
                false
            }
        }
    }

    fn broadcast_lobby_list(&self, state: &RelayState) {
        let message = OutboundMessage::LobbyList {
            lobbies: state.lobbies.list(),
        };

        for sink in state.registry.all() {
            if let Err(e) = sink.deliver(message.clone()) {
                self.metrics.record_send_failure();
                warn!("Lobby list send failed: {}", e);
            }
        }

        self.metrics.record_lobby_list_broadcast();
    }

    fn refresh_gauges(&self, state: &RelayState) {
        self.metrics.update_gauges(
            state.registry.len(),
            state.lobbies.len(),
            state.lobbies.member_total(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    type Inbox = mpsc::UnboundedReceiver<OutboundMessage>;

    fn create_test_handler() -> SessionHandler {
        SessionHandler::new(Arc::new(MetricsCollector::new().unwrap()))
    }

    fn connect(handler: &SessionHandler) -> (Session, Inbox) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = handler.connect(Arc::new(tx)).unwrap();
        // Discard the greeting
        assert!(matches!(rx.try_recv(), Ok(OutboundMessage::Hello { .. })));
        (session, rx)
    }

    fn drain(rx: &mut Inbox) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn send(handler: &SessionHandler, session: &mut Session, value: Value) {
        handler
            .handle_message(session, value.to_string().as_bytes())
            .unwrap();
    }

    #[test]
    fn test_connect_greets_with_client_id() {
        let handler = create_test_handler();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = handler.connect(Arc::new(tx)).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundMessage::Hello {
                client_id: session.client_id().to_string()
            }
        );
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(handler.stats().unwrap().connections, 1);
    }

    #[test]
    fn test_create_lobby_transitions_to_in_lobby() {
        let handler = create_test_handler();
        let (mut session, mut rx) = connect(&handler);

        send(
            &handler,
            &mut session,
            json!({"type": "create_lobby", "display_name": "X", "game_version": "1.0"}),
        );

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        let lobby_id = match &messages[0] {
            OutboundMessage::JoinedLobby { lobby } => {
                assert_eq!(lobby.display_name, "X");
                assert_eq!(lobby.game_version, "1.0");
                assert_eq!(lobby.members, 1);
                lobby.lobby_id.clone()
            }
            other => panic!("expected joined_lobby, got {:?}", other),
        };
        assert!(matches!(
            &messages[1],
            OutboundMessage::LobbyList { lobbies } if lobbies.len() == 1
        ));
        assert_eq!(session.state(), SessionState::InLobby(lobby_id));
    }

    #[test]
    fn test_join_unknown_lobby_leaves_state_untouched() {
        let handler = create_test_handler();
        let (mut session, mut rx) = connect(&handler);

        send(
            &handler,
            &mut session,
            json!({"type": "join_lobby", "lobby_id": "l_missing"}),
        );

        assert_eq!(
            drain(&mut rx),
            vec![OutboundMessage::Error {
                message: "Lobby not found".to_string()
            }]
        );
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_switching_lobbies_leaves_previous() {
        let handler = create_test_handler();
        let (mut host_a, _rx_a) = connect(&handler);
        let (mut host_b, _rx_b) = connect(&handler);
        let (mut guest, _rx_guest) = connect(&handler);

        send(&handler, &mut host_a, json!({"type": "create_lobby"}));
        send(&handler, &mut host_b, json!({"type": "create_lobby"}));
        let lobby_a = host_a.current_lobby_id().unwrap().to_string();
        let lobby_b = host_b.current_lobby_id().unwrap().to_string();

        send(&handler, &mut guest, json!({"type": "join_lobby", "lobby_id": lobby_a}));
        send(&handler, &mut guest, json!({"type": "join_lobby", "lobby_id": lobby_b}));

        let lobbies = handler.list_lobbies().unwrap();
        let count = |id: &str| lobbies.iter().find(|l| l.lobby_id == id).unwrap().members;
        assert_eq!(count(&lobby_a), 1);
        assert_eq!(count(&lobby_b), 2);
    }

    #[test]
    fn test_heartbeat_outside_lobby_is_silent() {
        let handler = create_test_handler();
        let (mut session, mut rx) = connect(&handler);

        send(&handler, &mut session, json!({"type": "heartbeat"}));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_leave_by_explicit_id_keeps_current_lobby() {
        let handler = create_test_handler();
        let (mut host, _rx_host) = connect(&handler);
        let (mut other, _rx_other) = connect(&handler);

        send(&handler, &mut host, json!({"type": "create_lobby"}));
        send(&handler, &mut other, json!({"type": "create_lobby"}));
        let host_lobby = host.current_lobby_id().unwrap().to_string();
        let other_lobby = other.current_lobby_id().unwrap().to_string();

        // Naming a lobby the client is not in changes nothing observable
        send(
            &handler,
            &mut host,
            json!({"type": "leave_lobby", "lobby_id": other_lobby}),
        );
        assert_eq!(host.current_lobby_id(), Some(host_lobby.as_str()));
        assert_eq!(handler.stats().unwrap().lobbies, 2);

        // Without an id the current lobby is left
        send(&handler, &mut host, json!({"type": "leave_lobby"}));
        assert_eq!(host.state(), SessionState::Connected);
        assert_eq!(handler.stats().unwrap().lobbies, 1);
    }

    #[test]
    fn test_sweep_presence_evicts_silent_members() {
        let handler = create_test_handler();
        let (mut host, mut rx) = connect(&handler);

        send(&handler, &mut host, json!({"type": "create_lobby"}));
        drain(&mut rx);

        let later = current_timestamp() + chrono::Duration::seconds(46);
        let outcome = handler
            .sweep_presence(later, Duration::from_secs(45))
            .unwrap();

        assert_eq!(outcome.evicted.len(), 1);
        assert_eq!(outcome.removed_lobbies.len(), 1);
        assert_eq!(
            drain(&mut rx),
            vec![OutboundMessage::LobbyList { lobbies: vec![] }]
        );

        // Nothing left to reap: no broadcast
        let outcome = handler
            .sweep_presence(later, Duration::from_secs(45))
            .unwrap();
        assert!(!outcome.changed());
        assert!(drain(&mut rx).is_empty());
    }
}
