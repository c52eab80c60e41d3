//! Shard manager
//!
//! Owns every [`ShardConnection`] and the shared identify clock. Shards are
//! brought up strictly one after another: identify requests share a global
//! rate limit, so shard `k + 1` does not start until shard `k` is ready.

use crate::codec::Codec;
use crate::config::ShardCount;
use crate::error::GatewayError;
use crate::events::{Diagnostic, ShardEvent};
use crate::gateway_info::{GatewayInfo, GatewayInfoSource};
use crate::metrics;
use crate::protocol::GatewayPayload;
use crate::shard::clock::IdentifyClock;
use crate::shard::connection::{ShardConnection, ShardContext, ShardSnapshot};
use crate::shard::state::ShardState;
use crate::transport::Connector;

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Buffered diagnostics per subscriber before the oldest are dropped
pub const DIAGNOSTIC_CAPACITY: usize = 1024;

/// Manager settings
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Bot credential
    pub token: String,
    /// Explicit shard count, or defer to the lookup's recommendation
    pub shard_count: ShardCount,
    /// Encoding used by every socket of this process
    pub codec: Codec,
}

/// Coordinates a set of shards sharing one credential
pub struct ShardManager {
    token: Arc<str>,
    shard_count: ShardCount,
    codec: Codec,
    info_source: Arc<dyn GatewayInfoSource>,
    connector: Arc<dyn Connector>,
    gateway: Option<GatewayInfo>,
    connections: BTreeMap<u32, ShardConnection>,
    clock: IdentifyClock,
    state: ShardState,
    events: mpsc::UnboundedSender<ShardEvent>,
    diagnostics: broadcast::Sender<Diagnostic>,
}

impl ShardManager {
    /// Create a manager and the receiving end of its event stream
    pub fn new(
        config: ManagerConfig,
        info_source: Arc<dyn GatewayInfoSource>,
        connector: Arc<dyn Connector>,
    ) -> (Self, mpsc::UnboundedReceiver<ShardEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (diagnostics, _) = broadcast::channel(DIAGNOSTIC_CAPACITY);

        let manager = Self {
            token: Arc::from(config.token),
            shard_count: config.shard_count,
            codec: config.codec,
            info_source,
            connector,
            gateway: None,
            connections: BTreeMap::new(),
            clock: IdentifyClock::new(),
            state: ShardState::new(),
            events,
            diagnostics,
        };

        (manager, events_rx)
    }

    /// Subscribe to lifecycle diagnostics of every shard
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    /// Get shared state (for health checks)
    pub fn state(&self) -> ShardState {
        self.state.clone()
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Cached gateway metadata, if fetched
    pub fn gateway(&self) -> Option<&GatewayInfo> {
        self.gateway.as_ref()
    }

    /// Effective shard count, once metadata is known
    pub fn total_shards(&self) -> Option<u32> {
        self.gateway
            .as_ref()
            .map(|info| self.shard_count.resolve(info.recommended_shards))
    }

    /// Indices with a live connection
    pub fn shard_ids(&self) -> Vec<u32> {
        self.connections.keys().copied().collect()
    }

    /// Forget cached metadata so the next `connect` fetches it again
    pub fn reset_gateway_info(&mut self) {
        self.gateway = None;
    }

    /// Bring up shards `start..end` (default end: the effective shard count),
    /// one at a time, each waiting for the previous one to be ready.
    ///
    /// A shard already present at an index is closed and replaced.
    pub async fn connect(&mut self, start: u32, end: Option<u32>) -> Result<(), GatewayError> {
        let info = self.gateway_info().await?;
        let total = self.shard_count.resolve(info.recommended_shards);
        let end = end.unwrap_or(total);

        if start > end || end > total {
            return Err(GatewayError::InvalidShardRange { start, end, total });
        }

        self.state.set_total_shards(total);
        info!(
            start,
            end,
            total_shards = total,
            url = %info.url,
            encoding = self.codec.name(),
            "Connecting shards"
        );

        for shard_id in start..end {
            if let Some(previous) = self.connections.remove(&shard_id) {
                previous.close().await;
            }

            self.state.register(shard_id);
            let connection = ShardConnection::spawn(shard_id, self.shard_context(total, &info.url));
            let ready = connection.connect().await?;
            self.connections.insert(shard_id, connection);

            self.clock.mark_ready(ready.ready_at);
            metrics::set_shards_ready(self.state.ready_shards());
            info!(shard_id, session_id = %ready.session_id, "Shard connected");
        }

        Ok(())
    }

    /// Route an outbound payload to the shard at `shard_id`.
    ///
    /// Resolves once the payload is handed to the socket; a shard that is
    /// not `Ready` rejects it with `ShardNotConnected`.
    pub async fn send(&self, shard_id: u32, payload: GatewayPayload) -> Result<(), GatewayError> {
        let connection = self
            .connections
            .get(&shard_id)
            .ok_or(GatewayError::ShardNotFound { shard_id })?;
        connection.send(payload).await
    }

    /// Session view of one shard
    pub async fn snapshot(&self, shard_id: u32) -> Result<ShardSnapshot, GatewayError> {
        let connection = self
            .connections
            .get(&shard_id)
            .ok_or(GatewayError::ShardNotFound { shard_id })?;
        connection.snapshot().await
    }

    /// Close every shard and drop its connection
    pub async fn close(&mut self) {
        let connections = std::mem::take(&mut self.connections);
        for (shard_id, connection) in connections {
            connection.close().await;
            self.state.remove(shard_id);
        }
        metrics::set_shards_ready(self.state.ready_shards());
        info!("All shards closed");
    }

    async fn gateway_info(&mut self) -> Result<GatewayInfo, GatewayError> {
        if let Some(info) = &self.gateway {
            return Ok(info.clone());
        }

        let info = self.info_source.gateway_info().await.map_err(|e| {
            warn!(error = %e, "Gateway metadata lookup failed");
            e
        })?;
        info!(
            url = %info.url,
            recommended_shards = info.recommended_shards,
            "Fetched gateway metadata"
        );
        self.gateway = Some(info.clone());
        Ok(info)
    }

    fn shard_context(&self, total_shards: u32, gateway_url: &str) -> ShardContext {
        ShardContext {
            token: Arc::clone(&self.token),
            total_shards,
            gateway_url: gateway_url.to_owned(),
            codec: self.codec,
            connector: Arc::clone(&self.connector),
            clock: self.clock.clone(),
            events: self.events.clone(),
            diagnostics: self.diagnostics.clone(),
            state: self.state.clone(),
        }
    }
}
