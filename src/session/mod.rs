//! Session layer for the relay service
//!
//! Per-connection protocol state and the handler that applies client
//! messages to the shared relay state.

pub mod handler;

pub use handler::{RelayState, RelayStats, Session, SessionHandler, SessionState};
