//! Domain error types for the Arrakis shard client
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All library code returns Result<T, GatewayError>.

use crate::codec::CodecError;
use thiserror::Error;

/// Gateway domain errors
///
/// Every variant carries structured context fields for diagnostics.
/// Transport faults and invalid sessions never surface here: the shard
/// state machine retries those on its own. What does surface is whatever
/// makes a caller-visible operation impossible.
///
/// Example log output:
/// ```text
/// GatewayError::ShardNotFound { shard_id: 7 }
/// → "no connection exists for shard 7"
/// ```
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Gateway metadata lookup failed (fatal to `ShardManager::connect`)
    #[error("gateway metadata lookup failed")]
    GatewayInfo(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Opening the socket failed
    #[error("failed to open gateway socket at '{url}'")]
    Connect {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A send was addressed at a shard index with no connection
    #[error("no connection exists for shard {shard_id}")]
    ShardNotFound { shard_id: u32 },

    /// Requested shard range does not fit the effective shard count
    #[error("shard range {start}..{end} is invalid for {total} shards")]
    InvalidShardRange { start: u32, end: u32, total: u32 },

    /// Shard has no open, identified socket to carry an application payload
    #[error("shard {shard_id} is not connected (stage: {stage})")]
    ShardNotConnected { shard_id: u32, stage: &'static str },

    /// Shard task ended before the requested operation completed
    #[error("shard {shard_id} connection task has shut down")]
    ShardClosed { shard_id: u32 },

    /// Payload encoding or decoding failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Configuration error (environment variable missing or invalid)
    #[error("configuration error: {0}")]
    Config(String),

    /// Prometheus recorder could not be installed
    #[error("metrics recorder installation failed")]
    MetricsInstall(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on `gateway_errors_total` counter,
    /// enabling per-error-type monitoring and alerting.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::GatewayInfo(_) => "gateway_info",
            Self::Connect { .. } => "connect",
            Self::ShardNotFound { .. } => "shard_not_found",
            Self::InvalidShardRange { .. } => "invalid_range",
            Self::ShardNotConnected { .. } => "shard_not_connected",
            Self::ShardClosed { .. } => "shard_closed",
            Self::Codec(_) => "codec",
            Self::Config(_) => "config",
            Self::MetricsInstall(_) => "metrics_install",
        }
    }
}
