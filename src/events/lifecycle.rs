//! Lifecycle diagnostics (the `DEBUG` stream)

use std::fmt;
use std::time::Duration;

/// One lifecycle transition of a shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Connecting { url: String },
    Opened,
    HelloReceived { heartbeat_interval: Duration },
    IdentifyDelayed { delay: Duration },
    IdentifySent,
    Ready { session_id: String },
    ResumeSent { sequence: Option<u64> },
    Resumed,
    HeartbeatSent { sequence: Option<u64> },
    HeartbeatAcked { latency: Option<Duration> },
    Zombied,
    ReconnectRequested,
    InvalidSession,
    ServerClosed { code: Option<u16>, reason: String },
    TransportError { message: String },
    ReconnectScheduled { delay: Duration, resume: bool },
    Closed,
    PayloadDropped { reason: String },
}

impl Lifecycle {
    /// Short label, used as a metric/log field
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting { .. } => "connecting",
            Self::Opened => "opened",
            Self::HelloReceived { .. } => "hello",
            Self::IdentifyDelayed { .. } => "identify_delayed",
            Self::IdentifySent => "identify",
            Self::Ready { .. } => "ready",
            Self::ResumeSent { .. } => "resume",
            Self::Resumed => "resumed",
            Self::HeartbeatSent { .. } => "heartbeat",
            Self::HeartbeatAcked { .. } => "heartbeat_ack",
            Self::Zombied => "zombied",
            Self::ReconnectRequested => "reconnect_requested",
            Self::InvalidSession => "invalid_session",
            Self::ServerClosed { .. } => "server_closed",
            Self::TransportError { .. } => "transport_error",
            Self::ReconnectScheduled { .. } => "reconnect_scheduled",
            Self::Closed => "closed",
            Self::PayloadDropped { .. } => "payload_dropped",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting { url } => write!(f, "opening connection to {url}"),
            Self::Opened => f.write_str("opened connection"),
            Self::HelloReceived { heartbeat_interval } => write!(
                f,
                "received hello, heartbeat every {}ms",
                heartbeat_interval.as_millis()
            ),
            Self::IdentifyDelayed { delay } => {
                write!(f, "waiting {}ms for identify rate limit", delay.as_millis())
            }
            Self::IdentifySent => f.write_str("sent identify"),
            Self::Ready { session_id } => write!(f, "ready, session {session_id}"),
            Self::ResumeSent { sequence } => match sequence {
                Some(seq) => write!(f, "sent resume from sequence {seq}"),
                None => f.write_str("sent resume"),
            },
            Self::Resumed => f.write_str("successfully resumed"),
            Self::HeartbeatSent { sequence } => match sequence {
                Some(seq) => write!(f, "sent heartbeat at sequence {seq}"),
                None => f.write_str("sent heartbeat"),
            },
            Self::HeartbeatAcked { latency } => match latency {
                Some(latency) => write!(f, "heartbeat acknowledged after {}ms", latency.as_millis()),
                None => f.write_str("heartbeat acknowledged"),
            },
            Self::Zombied => f.write_str("heartbeat not acknowledged, connection zombied"),
            Self::ReconnectRequested => f.write_str("server requested reconnect"),
            Self::InvalidSession => f.write_str("invalid session"),
            Self::ServerClosed { code, reason } => match code {
                Some(code) => write!(f, "server closed connection, code {code}, reason: {reason}"),
                None => write!(f, "server closed connection: {reason}"),
            },
            Self::TransportError { message } => write!(f, "transport error: {message}"),
            Self::ReconnectScheduled { delay, resume } => write!(
                f,
                "reconnecting in {}s ({})",
                delay.as_secs(),
                if *resume { "resume" } else { "identify" }
            ),
            Self::Closed => f.write_str("closed connection"),
            Self::PayloadDropped { reason } => write!(f, "dropped undecodable payload: {reason}"),
        }
    }
}

/// Lifecycle transition tagged with its shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub shard_id: u32,
    pub lifecycle: Lifecycle,
}

impl Diagnostic {
    /// Human-readable description
    pub fn message(&self) -> String {
        self.lifecycle.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[shard {}] {}", self.shard_id, self.lifecycle)
    }
}
