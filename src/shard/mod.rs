//! Shard management module
//!
//! One [`ShardConnection`] per socket, coordinated by a [`ShardManager`].

pub mod clock;
pub mod connection;
pub mod manager;
mod state;

pub use clock::{IdentifyClock, IDENTIFY_SPACING};
pub use connection::{
    ShardConnection, ShardContext, ShardReady, ShardSnapshot, INVALID_SESSION_RECONNECT_DELAY,
    SERVER_CLOSE_RECONNECT_DELAY, TRANSPORT_ERROR_RECONNECT_DELAY,
};
pub use manager::{ManagerConfig, ShardManager};
pub use state::{ShardStage, ShardState};
