//! WebSocket server accepting inbound heartbeat calls.

use crate::connection::serve_connection;
use anyhow::Result;
use gossip_core::{HeartbeatEndpoint, MemberAddress};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Listener side of the heartbeat transport.
pub struct HeartbeatServer;

impl HeartbeatServer {
    /// Bind to an address and return the TCP listener.
    pub async fn bind(listen_addr: &str) -> Result<TcpListener> {
        let listener = TcpListener::bind(listen_addr).await?;
        info!("Heartbeat server listening on {}", listen_addr);
        Ok(listener)
    }

    /// Default listen address for a node: all interfaces, on the port of its
    /// configured address.
    pub fn default_listen_addr(self_address: &MemberAddress) -> String {
        format!("0.0.0.0:{}", self_address.port())
    }

    /// Accept connections forever, serving each on its own task.
    pub async fn serve(listener: TcpListener, endpoint: HeartbeatEndpoint) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let endpoint = endpoint.clone();
                    tokio::spawn(async move {
                        serve_connection(stream, addr, endpoint).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_addr_uses_configured_port() {
        let addr: MemberAddress = "node-1.internal:7946".parse().unwrap();
        assert_eq!(HeartbeatServer::default_listen_addr(&addr), "0.0.0.0:7946");
    }
}
