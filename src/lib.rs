//! Arrakis Shards - sharded Discord gateway client
//!
//! - One state machine per shard socket: hello, identify or resume,
//!   heartbeat with zombie detection, fixed-delay reconnects
//! - A shard manager that brings shards up one at a time under the shared
//!   identify rate limit and re-emits their events tagged by shard
//! - Pluggable payload codec chosen once per process

pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway_info;
pub mod health;
pub mod metrics;
pub mod protocol;
pub mod shard;
pub mod transport;

pub use codec::Codec;
pub use config::{GatewayConfig, ShardCount};
pub use error::GatewayError;
pub use events::{Diagnostic, Lifecycle, ShardEvent};
pub use gateway_info::{GatewayInfo, GatewayInfoSource, StaticGatewayInfo};
pub use protocol::{GatewayPayload, OpCode};
pub use shard::{ManagerConfig, ShardConnection, ShardManager, ShardStage};
pub use transport::{Connector, WebSocketConnector};
