//! Gateway wire protocol
//!
//! Payload envelope `{op, d, s, t}`, the opcode table, and builders for the
//! payloads a shard sends on its own behalf (heartbeat, identify, resume).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Member count above which a guild is sent without its offline members
pub const LARGE_THRESHOLD: u64 = 250;

/// Dispatch type carrying the new session id
pub const READY: &str = "READY";
/// Dispatch type confirming a successful resume
pub const RESUMED: &str = "RESUMED";

/// Gateway opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum OpCode {
    /// Application event (inbound)
    Dispatch,
    /// Keepalive (outbound, or inbound as a request to beat now)
    Heartbeat,
    /// New session handshake (outbound)
    Identify,
    /// Re-establish a session (outbound)
    Resume,
    /// Server asks the client to reconnect and resume (inbound)
    Reconnect,
    /// Session is invalid (inbound)
    InvalidSession,
    /// First payload on a socket, carries `heartbeat_interval` (inbound)
    Hello,
    /// Heartbeat acknowledgement (inbound)
    HeartbeatAck,
    /// Anything else; preserved so application payloads pass through
    Other(u8),
}

impl From<u8> for OpCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            6 => Self::Resume,
            7 => Self::Reconnect,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => Self::Other(other),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        match op {
            OpCode::Dispatch => 0,
            OpCode::Heartbeat => 1,
            OpCode::Identify => 2,
            OpCode::Resume => 6,
            OpCode::Reconnect => 7,
            OpCode::InvalidSession => 9,
            OpCode::Hello => 10,
            OpCode::HeartbeatAck => 11,
            OpCode::Other(code) => code,
        }
    }
}

/// Payload envelope shared by every gateway message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: OpCode,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// Build a non-dispatch payload
    pub fn new(op: OpCode, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    /// `heartbeat_interval` from a hello payload, in milliseconds
    pub fn heartbeat_interval(&self) -> Option<u64> {
        self.d.get("heartbeat_interval").and_then(Value::as_u64)
    }

    /// `session_id` from a READY dispatch
    pub fn session_id(&self) -> Option<&str> {
        self.d.get("session_id").and_then(Value::as_str)
    }

    /// Dispatch type, if this is a dispatch
    pub fn event_type(&self) -> Option<&str> {
        match self.op {
            OpCode::Dispatch => self.t.as_deref(),
            _ => None,
        }
    }
}

/// Heartbeat carrying the last observed sequence (null before any)
pub fn heartbeat(last_sequence: Option<u64>) -> GatewayPayload {
    GatewayPayload::new(OpCode::Heartbeat, json!(last_sequence))
}

/// Identify for shard `[shard_id, total_shards]`
pub fn identify(token: &str, shard_id: u32, total_shards: u32) -> GatewayPayload {
    GatewayPayload::new(
        OpCode::Identify,
        json!({
            "token": token,
            "properties": {
                "os": std::env::consts::OS,
                "browser": env!("CARGO_PKG_NAME"),
                "device": env!("CARGO_PKG_NAME"),
            },
            "shard": [shard_id, total_shards],
            "compress": false,
            "large_threshold": LARGE_THRESHOLD,
            "presence": {},
        }),
    )
}

/// Resume of `session_id` from `sequence`
pub fn resume(token: &str, session_id: &str, sequence: Option<u64>) -> GatewayPayload {
    GatewayPayload::new(
        OpCode::Resume,
        json!({
            "token": token,
            "session_id": session_id,
            "seq": sequence,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_map_to_wire_values() {
        for (code, op) in [
            (0u8, OpCode::Dispatch),
            (1, OpCode::Heartbeat),
            (2, OpCode::Identify),
            (6, OpCode::Resume),
            (7, OpCode::Reconnect),
            (9, OpCode::InvalidSession),
            (10, OpCode::Hello),
            (11, OpCode::HeartbeatAck),
        ] {
            assert_eq!(OpCode::from(code), op);
            assert_eq!(u8::from(op), code);
        }
        assert_eq!(OpCode::from(3), OpCode::Other(3));
        assert_eq!(u8::from(OpCode::Other(3)), 3);
    }

    #[test]
    fn parses_hello() {
        let payload: GatewayPayload =
            serde_json::from_str(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
                .unwrap();
        assert_eq!(payload.op, OpCode::Hello);
        assert_eq!(payload.heartbeat_interval(), Some(41250));
        assert_eq!(payload.event_type(), None);
    }

    #[test]
    fn missing_envelope_fields_default() {
        let payload: GatewayPayload = serde_json::from_str(r#"{"op":11}"#).unwrap();
        assert_eq!(payload.op, OpCode::HeartbeatAck);
        assert_eq!(payload.d, Value::Null);
        assert_eq!(payload.s, None);
    }

    #[test]
    fn ready_dispatch_exposes_session() {
        let payload: GatewayPayload = serde_json::from_str(
            r#"{"op":0,"d":{"session_id":"abc"},"s":1,"t":"READY"}"#,
        )
        .unwrap();
        assert_eq!(payload.event_type(), Some(READY));
        assert_eq!(payload.session_id(), Some("abc"));
        assert_eq!(payload.s, Some(1));
    }

    #[test]
    fn identify_carries_shard_pair_and_limits() {
        let payload = identify("secret", 2, 5);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "secret");
        assert_eq!(value["d"]["shard"], json!([2, 5]));
        assert_eq!(value["d"]["compress"], false);
        assert_eq!(value["d"]["large_threshold"], 250);
        assert_eq!(value["d"]["presence"], json!({}));
    }

    #[test]
    fn heartbeat_carries_null_before_first_sequence() {
        assert_eq!(heartbeat(None).d, Value::Null);
        assert_eq!(heartbeat(Some(9)).d, json!(9));
    }

    #[test]
    fn resume_carries_session_and_sequence() {
        let payload = resume("secret", "abc", Some(12));
        assert_eq!(payload.op, OpCode::Resume);
        assert_eq!(payload.d["session_id"], "abc");
        assert_eq!(payload.d["seq"], 12);
    }
}
