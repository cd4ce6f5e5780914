//! HeartbeatTransport trait for delivering heartbeats to peers.
//!
//! Implementations:
//! - WebSocket: one short-lived connection per heartbeat (gossip-daemon)

use crate::MemberAddress;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Transport error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Outbound side of the heartbeat call.
///
/// The agent invokes this on a detached task and never inspects the peer's
/// reply; an error only gets logged.
#[async_trait]
pub trait HeartbeatTransport: Send + Sync + 'static {
    /// Announce `from` (our own address) to `target`.
    async fn send_heartbeat(&self, target: &MemberAddress, from: &MemberAddress) -> Result<()>;
}
