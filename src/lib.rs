//! Lobby Relay - in-memory lobby directory and message relay for game clients
//!
//! Clients connect over WebSocket, create or join named lobbies, keep their
//! membership alive with heartbeats, and relay opaque payloads to the other
//! members of their lobby. All state lives in memory.

pub mod config;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RelayError, Result};
pub use types::*;

// Re-export key components
pub use lobby::LobbyStore;
pub use protocol::{InboundCommand, OutboundMessage};
pub use registry::{ConnectionRegistry, MessageSink, SharedSink};
pub use session::{Session, SessionHandler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
