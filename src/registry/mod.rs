//! Connection registry
//!
//! Maps each connected client to the sink its outbound messages are pushed
//! into. The registry does no validation beyond existence: a missing entry
//! means the peer is unreachable and callers drop the message.

use crate::error::{RelayError, Result};
use crate::protocol::OutboundMessage;
use crate::types::ClientId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Destination for messages addressed to one client
pub trait MessageSink: Send + Sync {
    /// Queue a message for delivery. Must not block.
    fn deliver(&self, message: OutboundMessage) -> Result<()>;
}

/// Shared handle to a client's sink
pub type SharedSink = Arc<dyn MessageSink>;

impl MessageSink for mpsc::UnboundedSender<OutboundMessage> {
    fn deliver(&self, message: OutboundMessage) -> Result<()> {
        self.send(message).map_err(|_| {
            RelayError::InternalError {
                message: "Connection channel closed".to_string(),
            }
            .into()
        })
    }
}

/// Registry of connected clients and their sinks
#[derive(Default)]
pub struct ConnectionRegistry {
    sinks: HashMap<ClientId, SharedSink>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client's sink, replacing any previous one
    pub fn register(&mut self, client_id: ClientId, sink: SharedSink) {
        self.sinks.insert(client_id, sink);
    }

    /// Remove a client, returning its sink if it was registered
    pub fn unregister(&mut self, client_id: &str) -> Option<SharedSink> {
        self.sinks.remove(client_id)
    }

    pub fn lookup(&self, client_id: &str) -> Option<SharedSink> {
        self.sinks.get(client_id).cloned()
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.sinks.contains_key(client_id)
    }

    /// Every registered sink
    pub fn all(&self) -> Vec<SharedSink> {
        self.sinks.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
