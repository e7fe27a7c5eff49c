//! Presence tracking for lobby members

pub mod reaper;

pub use reaper::{PresenceReaper, DEFAULT_REAP_INTERVAL, DEFAULT_STALE_AFTER};
