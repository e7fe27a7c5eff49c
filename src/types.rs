//! Common types used throughout the relay service

use serde::{Deserialize, Serialize};

/// Unique identifier for a connected client
pub type ClientId = String;

/// Unique identifier for lobbies
pub type LobbyId = String;

/// Default display name for lobbies created without one
pub const DEFAULT_DISPLAY_NAME: &str = "Lobby";

/// Default game version for lobbies created without one
pub const DEFAULT_GAME_VERSION: &str = "unknown";

/// One row of a `lobby_list` broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyListing {
    pub lobby_id: LobbyId,
    pub display_name: String,
    pub game_version: String,
    /// Member count at snapshot time
    pub members: usize,
    /// Creation time in Unix epoch milliseconds
    pub created_at: i64,
}

/// Lobby summary sent to a client that just joined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub lobby_id: LobbyId,
    pub display_name: String,
    pub game_version: String,
    pub members: usize,
}
