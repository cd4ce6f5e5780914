//! Outgoing heartbeat calls.
//!
//! Each heartbeat opens a short-lived WebSocket to the target, sends one
//! heartbeat frame carrying our address and closes. The reply is not awaited.

use crate::message::RpcMessage;
use async_trait::async_trait;
use futures::SinkExt;
use gossip_core::transport::{self, TransportError};
use gossip_core::{HeartbeatTransport, MemberAddress};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::trace;

/// Default bound on establishing a connection to a peer.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket implementation of the heartbeat transport.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl HeartbeatTransport for WebSocketTransport {
    async fn send_heartbeat(
        &self,
        target: &MemberAddress,
        from: &MemberAddress,
    ) -> transport::Result<()> {
        let url = format!("ws://{}", target);

        let (mut ws, _) = timeout(self.connect_timeout, connect_async(&url))
            .await
            .map_err(|_| TransportError::Timeout(format!("connecting to {}", target)))?
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {}", target, e)))?;

        let heartbeat = RpcMessage::heartbeat(from.as_str());
        ws.send(Message::Binary(heartbeat.to_binary().into()))
            .await
            .map_err(|e| TransportError::SendFailed(format!("{}: {}", target, e)))?;

        trace!("Heartbeat delivered to {}", target);

        // Best effort; the peer may already be closing its side
        let _ = ws.close(None).await;
        Ok(())
    }
}
