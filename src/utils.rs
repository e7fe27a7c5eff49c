//! Utility functions for the relay service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Length of the random hex suffix on generated identifiers
const ID_SUFFIX_LEN: usize = 12;

fn prefixed_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..ID_SUFFIX_LEN])
}

/// Generate a new unique client ID
pub fn generate_client_id() -> String {
    prefixed_id("c")
}

/// Generate a new unique lobby ID
pub fn generate_lobby_id() -> String {
    prefixed_id("l")
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
