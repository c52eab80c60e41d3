//! Event surface
//!
//! Shards emit two streams through their manager: [`ShardEvent`]s (every
//! decoded payload and every dispatch, tagged with the shard index) and
//! [`Diagnostic`]s describing lifecycle transitions.

pub mod lifecycle;

pub use lifecycle::{Diagnostic, Lifecycle};

use crate::protocol::GatewayPayload;
use serde_json::Value;

/// Event re-emitted by the shard manager
#[derive(Debug, Clone, PartialEq)]
pub enum ShardEvent {
    /// Every decoded inbound payload, raw
    Payload {
        shard_id: u32,
        payload: GatewayPayload,
    },
    /// Application event (opcode 0), named after its dispatch type
    Dispatch {
        shard_id: u32,
        event_type: String,
        data: Value,
    },
}

impl ShardEvent {
    pub fn shard_id(&self) -> u32 {
        match self {
            ShardEvent::Payload { shard_id, .. } | ShardEvent::Dispatch { shard_id, .. } => *shard_id,
        }
    }

    /// Event name: the dispatch type, or `PAYLOAD`
    pub fn name(&self) -> &str {
        match self {
            ShardEvent::Payload { .. } => "PAYLOAD",
            ShardEvent::Dispatch { event_type, .. } => event_type,
        }
    }
}
