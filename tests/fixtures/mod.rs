//! Test fixtures and mock sinks for integration testing

#![allow(dead_code)]

use lobby_relay::error::{RelayError, Result};
use lobby_relay::metrics::MetricsCollector;
use lobby_relay::protocol::OutboundMessage;
use lobby_relay::registry::MessageSink;
use lobby_relay::session::{Session, SessionHandler};
use lobby_relay::types::LobbyListing;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Sink that captures every delivered message for inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages received so far
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Remove and return everything received so far
    pub fn take(&self) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .map(|mut messages| std::mem::take(&mut *messages))
            .unwrap_or_default()
    }

    /// Count messages of a specific wire type
    pub fn count_of_type(&self, message_type: &str) -> usize {
        self.messages()
            .iter()
            .filter(|message| message.message_type() == message_type)
            .count()
    }

    /// The most recent lobby list received, if any
    pub fn last_lobby_list(&self) -> Option<Vec<LobbyListing>> {
        self.messages().into_iter().rev().find_map(|message| match message {
            OutboundMessage::LobbyList { lobbies } => Some(lobbies),
            _ => None,
        })
    }
}

impl MessageSink for RecordingSink {
    fn deliver(&self, message: OutboundMessage) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
        Ok(())
    }
}

/// Sink whose peer has already gone away
#[derive(Debug, Default)]
pub struct FailingSink;

impl MessageSink for FailingSink {
    fn deliver(&self, _message: OutboundMessage) -> Result<()> {
        Err(RelayError::InternalError {
            message: "socket closing".to_string(),
        }
        .into())
    }
}

/// A connected client: its session plus the sink capturing its traffic
pub struct TestClient {
    pub session: Session,
    pub sink: Arc<RecordingSink>,
}

impl TestClient {
    pub fn id(&self) -> String {
        self.session.client_id().to_string()
    }

    pub fn lobby_id(&self) -> Option<String> {
        self.session.current_lobby_id().map(str::to_string)
    }
}

pub fn create_test_handler() -> SessionHandler {
    SessionHandler::new(Arc::new(
        MetricsCollector::new().expect("Failed to create metrics collector"),
    ))
}

/// Connect a recording client and clear its greeting
pub fn connect_client(handler: &SessionHandler) -> TestClient {
    let sink = Arc::new(RecordingSink::new());
    let session = handler
        .connect(sink.clone())
        .expect("Failed to connect client");
    sink.take();
    TestClient { session, sink }
}

/// Send a JSON frame on behalf of a client
pub fn send_json(handler: &SessionHandler, client: &mut TestClient, value: Value) {
    handler
        .handle_message(&mut client.session, value.to_string().as_bytes())
        .expect("Failed to handle message");
}

/// Create a lobby owned by `client` and return its id
pub fn create_lobby(handler: &SessionHandler, client: &mut TestClient, name: &str) -> String {
    send_json(
        handler,
        client,
        serde_json::json!({"type": "create_lobby", "display_name": name, "game_version": "1.0"}),
    );
    client.lobby_id().expect("Creator should be in the new lobby")
}
