//! Periodic eviction of silent or disconnected lobby members

use crate::lobby::ReapOutcome;
use crate::session::SessionHandler;
use crate::utils::current_timestamp;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default sweep period
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(15_000);

/// Default staleness threshold
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(45_000);

/// Presence reaper configuration and driver
#[derive(Debug, Clone)]
pub struct PresenceReaper {
    interval: Duration,
    stale_after: Duration,
}

impl Default for PresenceReaper {
    fn default() -> Self {
        Self::new(DEFAULT_REAP_INTERVAL, DEFAULT_STALE_AFTER)
    }
}

impl PresenceReaper {
    pub fn new(interval: Duration, stale_after: Duration) -> Self {
        Self {
            interval,
            stale_after,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Run a single sweep at `now`
    pub fn tick(&self, handler: &SessionHandler, now: DateTime<Utc>) -> Result<ReapOutcome> {
        handler.sweep_presence(now, self.stale_after)
    }

    /// Spawn the periodic sweep on the current runtime. The task exits once
    /// `shutdown_rx` fires or its sender is dropped.
    pub fn spawn(
        self,
        handler: SessionHandler,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // The first tick completes immediately
            interval.tick().await;
            info!(
                "Presence reaper started - interval: {}ms, stale after: {}ms",
                self.interval.as_millis(),
                self.stale_after.as_millis()
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.recv() => {
                        info!("Presence reaper shutting down");
                        break;
                    }
                }

                match self.tick(&handler, current_timestamp()) {
                    Ok(outcome) if outcome.changed() => {
                        debug!(
                            "Reaper tick evicted {} members, removed {} lobbies",
                            outcome.evicted.len(),
                            outcome.removed_lobbies.len()
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Presence sweep failed: {}", e);
                    }
                }
            }
        })
    }
}
