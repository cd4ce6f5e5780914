//! Individual inbound heartbeat connection.
//!
//! Each accepted WebSocket is served on its own task: every heartbeat frame is
//! handed to the agent's endpoint and answered with its verdict.

use crate::message::{MAX_MESSAGE_SIZE, RpcMessage};
use futures::{SinkExt, StreamExt};
use gossip_core::HeartbeatEndpoint;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, trace, warn};

/// Serve one inbound connection until the peer closes it.
pub async fn serve_connection(stream: TcpStream, addr: SocketAddr, endpoint: HeartbeatEndpoint) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            // Health checks (like `nc -z`) connect and close without upgrading
            debug!("WebSocket upgrade failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    loop {
        let data = match read.next().await {
            Some(Ok(msg)) => match msg {
                Message::Binary(data) => data.to_vec(),
                Message::Text(text) => text.into_bytes(),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                Message::Close(_) => {
                    trace!("Received close frame from {}", addr);
                    break;
                }
            },
            Some(Err(e)) => {
                match e {
                    WsError::ConnectionClosed | WsError::AlreadyClosed => {
                        trace!("Connection from {} closed", addr);
                    }
                    _ => {
                        debug!("WebSocket error from {}: {}", addr, e);
                    }
                }
                break;
            }
            None => break,
        };

        if data.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds max size ({} > {}), dropping",
                addr,
                data.len(),
                MAX_MESSAGE_SIZE
            );
            continue;
        }

        let reply = match RpcMessage::from_binary(&data) {
            Some(RpcMessage::Heartbeat { from }) => match endpoint.receive(&from).await {
                Ok(outcome) => {
                    trace!("Heartbeat from {} via {}: {:?}", from, addr, outcome);
                    RpcMessage::Ack
                }
                Err(e) => {
                    debug!("Rejected heartbeat from {}: {}", addr, e);
                    RpcMessage::error(e.to_string())
                }
            },
            Some(other) => {
                warn!("Unexpected message from {}: {:?}", addr, other);
                continue;
            }
            None => RpcMessage::error("malformed message"),
        };

        // Fire-and-forget senders often hang up before reading the reply
        if let Err(e) = write.send(Message::Binary(reply.to_binary().into())).await {
            trace!("Could not reply to {}: {}", addr, e);
            break;
        }
    }

    if let Err(e) = write.close().await {
        match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {}
            _ => error!("Failed to close connection from {}: {}", addr, e),
        }
    }
}
