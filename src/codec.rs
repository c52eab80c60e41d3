//! Payload codec
//!
//! Two interchangeable encodings: `json`, always available, and `msgpack`,
//! compiled in with the `msgpack` feature. The codec is chosen once at
//! startup and handed to every shard; its name is the `encoding` query
//! parameter of every socket the process opens.

use crate::transport::WireMessage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Codec failures, scoped to a single message
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("json codec failed")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "msgpack")]
    #[error("msgpack encode failed")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[cfg(feature = "msgpack")]
    #[error("msgpack decode failed")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    /// Requested encoding is unknown or not compiled into this build
    #[error("unsupported gateway encoding '{0}'")]
    Unsupported(String),
}

/// Payload encoding capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Text frames carrying JSON
    Json,
    /// Binary frames carrying MessagePack
    #[cfg(feature = "msgpack")]
    MessagePack,
}

impl Codec {
    /// The fastest codec this build supports.
    pub fn preferred() -> Self {
        #[cfg(feature = "msgpack")]
        {
            Codec::MessagePack
        }
        #[cfg(not(feature = "msgpack"))]
        {
            Codec::Json
        }
    }

    /// Negotiated name, sent as `?encoding=<name>`
    pub fn name(self) -> &'static str {
        match self {
            Codec::Json => "json",
            #[cfg(feature = "msgpack")]
            Codec::MessagePack => "msgpack",
        }
    }

    /// Encode a value into the frame type this codec travels in.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<WireMessage, CodecError> {
        match self {
            Codec::Json => Ok(WireMessage::Text(serde_json::to_string(value)?)),
            #[cfg(feature = "msgpack")]
            Codec::MessagePack => Ok(WireMessage::Binary(rmp_serde::to_vec_named(value)?)),
        }
    }

    /// Decode a frame. Either frame type is accepted; only the bytes matter.
    pub fn decode<T: DeserializeOwned>(self, message: &WireMessage) -> Result<T, CodecError> {
        match self {
            Codec::Json => Ok(serde_json::from_slice(message.as_bytes())?),
            #[cfg(feature = "msgpack")]
            Codec::MessagePack => Ok(rmp_serde::from_slice(message.as_bytes())?),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::preferred()
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Codec::Json),
            #[cfg(feature = "msgpack")]
            "msgpack" => Ok(Codec::MessagePack),
            other => Err(CodecError::Unsupported(other.to_string())),
        }
    }
}
