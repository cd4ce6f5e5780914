//! Heartbeat call messages.
//!
//! Messages are JSON sent as binary WebSocket frames (UTF-8 bytes),
//! tagged by a `type` field.

use serde::{Deserialize, Serialize};

/// Maximum message size (64KB). Heartbeats are tiny; anything larger is dropped.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// A message on a heartbeat connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RpcMessage {
    /// "I am alive": sent by a peer's fan-out, carrying its own address
    Heartbeat {
        /// Missing `from` decodes as empty and is rejected by the endpoint
        #[serde(default)]
        from: String,
    },
    /// Heartbeat accepted
    Ack,
    /// Heartbeat rejected (e.g., "unknown member 10.0.0.9:8000")
    Error { message: String },
}

impl RpcMessage {
    pub fn heartbeat(from: &str) -> Self {
        Self::Heartbeat {
            from: from.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to UTF-8 JSON bytes for sending as binary WebSocket frame.
    pub fn to_binary(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("RpcMessage serialization should not fail")
    }

    /// Try to parse a message from binary data.
    ///
    /// Returns None if the data is not valid UTF-8 JSON or not a known message.
    pub fn from_binary(data: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(data).ok()?;
        serde_json::from_str(text).ok()
    }
}
