//! Gateway configuration module
//!
//! Handles loading configuration from environment variables.

use crate::codec::Codec;
use crate::error::GatewayError;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Desired shard count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShardCount {
    /// Use the gateway's recommendation
    #[default]
    Auto,
    /// Explicit count, overrides the recommendation
    Fixed(u32),
}

impl ShardCount {
    /// Effective count given the recommendation
    pub fn resolve(self, recommended: u32) -> u32 {
        match self {
            ShardCount::Auto => recommended,
            ShardCount::Fixed(count) => count,
        }
    }
}

impl FromStr for ShardCount {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(ShardCount::Auto);
        }
        match s.parse::<u32>() {
            Ok(0) => Err(GatewayError::Config("SHARD_COUNT must be at least 1".to_string())),
            Ok(count) => Ok(ShardCount::Fixed(count)),
            Err(e) => Err(GatewayError::Config(format!(
                "SHARD_COUNT must be 'auto' or a number: {e}"
            ))),
        }
    }
}

impl fmt::Display for ShardCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardCount::Auto => f.write_str("auto"),
            ShardCount::Fixed(count) => write!(f, "{count}"),
        }
    }
}

/// Gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Discord bot token
    pub discord_token: String,

    /// Total shard count, or `auto`
    pub shard_count: ShardCount,

    /// First shard index this process brings up
    pub shard_start: u32,

    /// Exclusive end of this process's shard range (default: shard count)
    pub shard_end: Option<u32>,

    /// Payload encoding for every socket
    pub encoding: Codec,

    /// Health/metrics HTTP port
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("discord_token", &"<redacted>")
            .field("shard_count", &self.shard_count)
            .field("shard_start", &self.shard_start)
            .field("shard_end", &self.shard_end)
            .field("encoding", &self.encoding)
            .field("http_port", &self.http_port)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let discord_token = lookup("DISCORD_TOKEN")
            .or_else(|| lookup("DISCORD_BOT_TOKEN"))
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::Config("DISCORD_TOKEN or DISCORD_BOT_TOKEN must be set".to_string())
            })?;

        let shard_count = lookup("SHARD_COUNT")
            .unwrap_or_else(|| "auto".to_string())
            .parse()?;

        let shard_start = lookup("SHARD_START")
            .unwrap_or_else(|| "0".to_string())
            .parse()
            .map_err(|e| GatewayError::Config(format!("SHARD_START must be a valid number: {e}")))?;

        let shard_end = lookup("SHARD_END")
            .map(|end| end.parse::<u32>())
            .transpose()
            .map_err(|e| GatewayError::Config(format!("SHARD_END must be a valid number: {e}")))?;

        if let Some(end) = shard_end {
            if end < shard_start {
                return Err(GatewayError::Config(format!(
                    "SHARD_END ({end}) must not be below SHARD_START ({shard_start})"
                )));
            }
        }

        let encoding = match lookup("GATEWAY_ENCODING") {
            Some(name) => name.parse()?,
            None => Codec::preferred(),
        };

        let http_port = lookup("HTTP_PORT")
            .or_else(|| lookup("METRICS_PORT")) // Backwards compat
            .unwrap_or_else(|| "9090".to_string())
            .parse()
            .map_err(|e| GatewayError::Config(format!("HTTP_PORT must be a valid port number: {e}")))?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            discord_token,
            shard_count,
            shard_start,
            shard_end,
            encoding,
            http_port,
            log_level,
        })
    }
}
