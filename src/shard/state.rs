//! Shard state tracking
//!
//! Per-shard stage and counters, written by each shard's own task and read
//! by the health endpoints.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Connection stage of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStage {
    /// No socket
    Disconnected,
    /// Socket is opening
    Connecting,
    /// Socket open, waiting for hello
    AwaitingHello,
    /// Hello received, identify pending or sent
    Identifying,
    /// Hello received, resume pending or sent
    Resuming,
    /// Session established
    Ready,
    /// Reconnect timer running
    Reconnecting,
}

impl ShardStage {
    /// Returns true if the shard is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, ShardStage::Ready | ShardStage::Resuming)
    }

    /// Returns true if the shard is ready to receive events
    pub fn is_ready(&self) -> bool {
        matches!(self, ShardStage::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShardStage::Disconnected => "disconnected",
            ShardStage::Connecting => "connecting",
            ShardStage::AwaitingHello => "awaiting_hello",
            ShardStage::Identifying => "identifying",
            ShardStage::Resuming => "resuming",
            ShardStage::Ready => "ready",
            ShardStage::Reconnecting => "reconnecting",
        }
    }
}

/// State for a single shard
#[derive(Debug)]
pub struct ShardStateEntry {
    pub stage: ShardStage,
    pub events_received: AtomicU64,
    pub reconnects: AtomicU64,
    pub last_heartbeat_ack: Option<Instant>,
    pub ready_at: Option<Instant>,
}

impl Default for ShardStateEntry {
    fn default() -> Self {
        Self {
            stage: ShardStage::Disconnected,
            events_received: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            last_heartbeat_ack: None,
            ready_at: None,
        }
    }
}

/// Shared state across all shards of a manager
#[derive(Debug, Clone, Default)]
pub struct ShardState {
    inner: Arc<ShardStateInner>,
}

#[derive(Debug, Default)]
struct ShardStateInner {
    shards: DashMap<u32, ShardStateEntry>,
    total_shards: AtomicU32,
}

impl ShardState {
    /// Create an empty shard state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a shard, resetting any previous entry
    pub fn register(&self, shard_id: u32) {
        self.inner.shards.insert(shard_id, ShardStateEntry::default());
    }

    /// Stop tracking a shard
    pub fn remove(&self, shard_id: u32) {
        self.inner.shards.remove(&shard_id);
    }

    /// Get total shards across the session (the identify shard count)
    pub fn total_shards(&self) -> u32 {
        self.inner.total_shards.load(Ordering::Relaxed)
    }

    pub fn set_total_shards(&self, total: u32) {
        self.inner.total_shards.store(total, Ordering::Relaxed);
    }

    /// Update shard stage
    pub fn set_stage(&self, shard_id: u32, stage: ShardStage) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.stage = stage;
            if stage == ShardStage::Ready {
                entry.ready_at = Some(Instant::now());
            }
        }
    }

    /// Increment event received counter
    pub fn record_event(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.events_received.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Increment reconnect counter
    pub fn record_reconnect(&self, shard_id: u32) {
        if let Some(entry) = self.inner.shards.get(&shard_id) {
            entry.reconnects.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record heartbeat acknowledgement
    pub fn record_heartbeat_ack(&self, shard_id: u32) {
        if let Some(mut entry) = self.inner.shards.get_mut(&shard_id) {
            entry.last_heartbeat_ack = Some(Instant::now());
        }
    }

    /// Get stage for a specific shard
    pub fn get_stage(&self, shard_id: u32) -> Option<ShardStage> {
        self.inner.shards.get(&shard_id).map(|e| e.stage)
    }

    /// Get events received by one shard
    pub fn events_received(&self, shard_id: u32) -> u64 {
        self.inner
            .shards
            .get(&shard_id)
            .map_or(0, |e| e.events_received.load(Ordering::Relaxed))
    }

    /// Get reconnects scheduled by one shard
    pub fn reconnects(&self, shard_id: u32) -> u64 {
        self.inner
            .shards
            .get(&shard_id)
            .map_or(0, |e| e.reconnects.load(Ordering::Relaxed))
    }

    /// Get total events received across all shards
    pub fn total_events_received(&self) -> u64 {
        self.inner
            .shards
            .iter()
            .map(|e| e.events_received.load(Ordering::Relaxed))
            .sum()
    }

    /// Get count of ready shards
    pub fn ready_shards(&self) -> usize {
        self.inner
            .shards
            .iter()
            .filter(|e| e.stage.is_ready())
            .count()
    }

    /// Get count of healthy shards (ready or resuming)
    pub fn healthy_shards(&self) -> usize {
        self.inner
            .shards
            .iter()
            .filter(|e| e.stage.is_healthy())
            .count()
    }

    /// Get tracked shard count
    pub fn shard_count(&self) -> usize {
        self.inner.shards.len()
    }

    /// Check if at least one shard is ready
    pub fn is_ready(&self) -> bool {
        self.ready_shards() > 0
    }

    /// Check if every tracked shard is healthy
    pub fn is_healthy(&self) -> bool {
        self.healthy_shards() == self.shard_count()
    }
}
