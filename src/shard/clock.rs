//! Shared identify rate limit
//!
//! Identify sends across all shards of one manager must be at least
//! [`IDENTIFY_SPACING`] apart. Each shard delays its identify by whatever is
//! left of that window since the last shard became ready.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between identify sends of any two shards
pub const IDENTIFY_SPACING: Duration = Duration::from_millis(5000);

/// The manager's "last ready" timestamp
#[derive(Debug, Clone, Default)]
pub struct IdentifyClock {
    last_ready: Arc<Mutex<Option<Instant>>>,
}

impl IdentifyClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_ready(&self) -> Option<Instant> {
        *self.last_ready.lock()
    }

    /// Record a shard becoming ready. Never moves the clock backwards.
    pub fn mark_ready(&self, at: Instant) {
        let mut last_ready = self.last_ready.lock();
        if last_ready.map_or(true, |previous| at > previous) {
            *last_ready = Some(at);
        }
    }

    /// `max(0, spacing - elapsed since last ready)`
    pub fn identify_delay(&self, now: Instant) -> Duration {
        match self.last_ready() {
            Some(last_ready) => IDENTIFY_SPACING.saturating_sub(now.saturating_duration_since(last_ready)),
            None => Duration::ZERO,
        }
    }
}
