//! Network transport for the relay
//!
//! An axum HTTP server whose WebSocket route feeds per-connection actors.

pub mod server;
pub mod websocket;

pub use server::{RelayServer, RelayServerConfig, ServerState};
pub use websocket::run_connection;
