//! Lobby management for the relay service
//!
//! This module holds lobby records and their membership and presence state.

pub mod instance;
pub mod store;

// Re-export commonly used types
pub use instance::Lobby;
pub use store::{LobbyStore, ReapOutcome};
