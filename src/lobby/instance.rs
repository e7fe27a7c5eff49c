//! Lobby instance and membership bookkeeping
//!
//! A lobby tracks its members and when each of them was last heard from.
//! Presence timestamps are only kept for current members.

use crate::types::{ClientId, LobbyId, LobbyListing, LobbySummary};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A named group of clients relaying payloads to each other
#[derive(Debug, Clone)]
pub struct Lobby {
    id: LobbyId,
    display_name: String,
    game_version: String,
    created_at: DateTime<Utc>,
    /// Creator of the lobby; informational only
    host_client_id: ClientId,
    members: HashSet<ClientId>,
    last_seen: HashMap<ClientId, DateTime<Utc>>,
}

impl Lobby {
    /// Create a lobby with its creator as the only member
    pub fn new(
        id: LobbyId,
        display_name: String,
        game_version: String,
        creator_id: ClientId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut members = HashSet::new();
        members.insert(creator_id.clone());
        let mut last_seen = HashMap::new();
        last_seen.insert(creator_id.clone(), now);

        Self {
            id,
            display_name,
            game_version,
            created_at: now,
            host_client_id: creator_id,
            members,
            last_seen,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn host_client_id(&self) -> &str {
        &self.host_client_id
    }

    pub fn members(&self) -> &HashSet<ClientId> {
        &self.members
    }

    pub fn is_member(&self, client_id: &str) -> bool {
        self.members.contains(client_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Last heartbeat of a member, if any
    pub fn last_seen(&self, client_id: &str) -> Option<DateTime<Utc>> {
        self.last_seen.get(client_id).copied()
    }

    /// Add a member and stamp its presence. Returns false if it was already a member.
    pub fn add_member(&mut self, client_id: ClientId, now: DateTime<Utc>) -> bool {
        self.last_seen.insert(client_id.clone(), now);
        self.members.insert(client_id)
    }

    /// Remove a member and its presence record. Returns true if it was a member.
    pub fn remove_member(&mut self, client_id: &str) -> bool {
        self.last_seen.remove(client_id);
        self.members.remove(client_id)
    }

    /// Refresh a member's presence. Non-members are ignored.
    pub fn touch(&mut self, client_id: &str, now: DateTime<Utc>) -> bool {
        if !self.members.contains(client_id) {
            return false;
        }
        self.last_seen.insert(client_id.to_string(), now);
        true
    }

    /// Members that are disconnected or whose last heartbeat is older than `stale_after`.
    ///
    /// A member without a presence record counts as never seen.
    pub fn stale_members<F>(
        &self,
        now: DateTime<Utc>,
        stale_after: Duration,
        is_connected: F,
    ) -> Vec<ClientId>
    where
        F: Fn(&str) -> bool,
    {
        let threshold_ms = i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX);

        self.members
            .iter()
            .filter(|client_id| {
                if !is_connected(client_id) {
                    return true;
                }
                match self.last_seen.get(client_id.as_str()) {
                    Some(seen) => (now - *seen).num_milliseconds() > threshold_ms,
                    None => true,
                }
            })
            .cloned()
            .collect()
    }

    /// Row for a `lobby_list` broadcast
    pub fn listing(&self) -> LobbyListing {
        LobbyListing {
            lobby_id: self.id.clone(),
            display_name: self.display_name.clone(),
            game_version: self.game_version.clone(),
            members: self.members.len(),
            created_at: self.created_at.timestamp_millis(),
        }
    }

    /// Summary for a `joined_lobby` reply
    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            lobby_id: self.id.clone(),
            display_name: self.display_name.clone(),
            game_version: self.game_version.clone(),
            members: self.members.len(),
        }
    }
}
