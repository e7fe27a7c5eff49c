//! Lobby store
//!
//! Owns every lobby record. The store is a plain data structure: callers are
//! responsible for serializing access (see `session::handler`). After any
//! operation that can shrink a member set, callers run [`LobbyStore::remove_empty`]
//! before the next lobby list leaves the process.

use crate::error::RelayError;
use crate::lobby::instance::Lobby;
use crate::types::{ClientId, LobbyId, LobbyListing, LobbySummary};
use crate::utils::generate_lobby_id;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Result of a presence sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapOutcome {
    /// Members evicted during the staleness pass
    pub evicted: Vec<(LobbyId, ClientId)>,
    /// Lobbies deleted during the emptiness pass
    pub removed_lobbies: Vec<LobbyId>,
}

impl ReapOutcome {
    /// Whether the sweep changed anything observable
    pub fn changed(&self) -> bool {
        !self.evicted.is_empty() || !self.removed_lobbies.is_empty()
    }
}

/// In-memory store of all lobbies
#[derive(Debug, Default)]
pub struct LobbyStore {
    lobbies: HashMap<LobbyId, Lobby>,
}

impl LobbyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lobby with the creator as its only member
    pub fn create(
        &mut self,
        display_name: String,
        game_version: String,
        creator_id: ClientId,
        now: DateTime<Utc>,
    ) -> LobbySummary {
        let mut lobby_id = generate_lobby_id();
        while self.lobbies.contains_key(&lobby_id) {
            lobby_id = generate_lobby_id();
        }

        let lobby = Lobby::new(lobby_id.clone(), display_name, game_version, creator_id, now);
        let summary = lobby.summary();
        self.lobbies.insert(lobby_id, lobby);
        summary
    }

    pub fn get(&self, lobby_id: &str) -> Option<&Lobby> {
        self.lobbies.get(lobby_id)
    }

    pub fn contains(&self, lobby_id: &str) -> bool {
        self.lobbies.contains_key(lobby_id)
    }

    /// Add a client to a lobby. Joining a lobby twice is a no-op apart from
    /// refreshing presence.
    pub fn join(
        &mut self,
        lobby_id: &str,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LobbySummary, RelayError> {
        let lobby = self
            .lobbies
            .get_mut(lobby_id)
            .ok_or_else(|| RelayError::LobbyNotFound {
                lobby_id: lobby_id.to_string(),
            })?;

        lobby.add_member(client_id.to_string(), now);
        Ok(lobby.summary())
    }

    /// Remove a client from a lobby. Returns true if it was a member.
    pub fn leave(&mut self, lobby_id: &str, client_id: &str) -> bool {
        self.lobbies
            .get_mut(lobby_id)
            .map(|lobby| lobby.remove_member(client_id))
            .unwrap_or(false)
    }

    /// Refresh a member's presence. Unknown lobbies are ignored.
    pub fn touch(&mut self, lobby_id: &str, client_id: &str, now: DateTime<Utc>) -> bool {
        self.lobbies
            .get_mut(lobby_id)
            .map(|lobby| lobby.touch(client_id, now))
            .unwrap_or(false)
    }

    /// Snapshot of every lobby, oldest first
    pub fn list(&self) -> Vec<LobbyListing> {
        let mut lobbies: Vec<&Lobby> = self.lobbies.values().collect();
        lobbies.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        lobbies.into_iter().map(Lobby::listing).collect()
    }

    /// Members of a lobby at call time; empty if the lobby does not exist
    pub fn snapshot_members(&self, lobby_id: &str) -> HashSet<ClientId> {
        self.lobbies
            .get(lobby_id)
            .map(|lobby| lobby.members().clone())
            .unwrap_or_default()
    }

    /// Delete every lobby without members, returning their IDs
    pub fn remove_empty(&mut self) -> Vec<LobbyId> {
        let empty: Vec<LobbyId> = self
            .lobbies
            .iter()
            .filter(|(_, lobby)| lobby.is_empty())
            .map(|(lobby_id, _)| lobby_id.clone())
            .collect();

        for lobby_id in &empty {
            self.lobbies.remove(lobby_id);
            debug!("Removed empty lobby {}", lobby_id);
        }

        empty
    }

    /// Evict disconnected or silent members, then delete emptied lobbies
    pub fn reap_stale<F>(
        &mut self,
        now: DateTime<Utc>,
        stale_after: Duration,
        is_connected: F,
    ) -> ReapOutcome
    where
        F: Fn(&str) -> bool,
    {
        let mut outcome = ReapOutcome::default();

        for (lobby_id, lobby) in self.lobbies.iter_mut() {
            for client_id in lobby.stale_members(now, stale_after, &is_connected) {
                lobby.remove_member(&client_id);
                debug!("Evicted stale member {} from lobby {}", client_id, lobby_id);
                outcome.evicted.push((lobby_id.clone(), client_id));
            }
        }

        outcome.removed_lobbies = self.remove_empty();
        outcome
    }

    /// Number of lobbies
    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }

    /// Sum of member counts across all lobbies
    pub fn member_total(&self) -> usize {
        self.lobbies.values().map(Lobby::member_count).sum()
    }
}
