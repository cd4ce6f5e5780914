//! A running node: heartbeat server plus agent loop.

use crate::outgoing::WebSocketTransport;
use crate::server::HeartbeatServer;
use anyhow::Result;
use gossip_core::{Agent, AgentConfig, EventBus, HeartbeatEndpoint, MemberAddress};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to a node started with `Node::start`.
pub struct Node {
    self_address: MemberAddress,
    local_addr: SocketAddr,
    endpoint: HeartbeatEndpoint,
    events: Arc<EventBus>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    agent_task: JoinHandle<()>,
    server_task: JoinHandle<()>,
}

impl Node {
    /// Start the agent for `config`, serving inbound heartbeats on `listener`.
    ///
    /// The listener is already bound, so peers can reach us before the agent
    /// starts its watchdogs.
    pub fn start(config: &AgentConfig, listener: TcpListener, transport: WebSocketTransport) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        let (agent, endpoint) = Agent::new(config, transport);
        let events = agent.events();

        let server_task = tokio::spawn(HeartbeatServer::serve(listener, endpoint.clone()));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let agent_task = tokio::spawn(agent.run_until(async {
            let _ = shutdown_rx.await;
        }));

        info!(
            "Node {} running (listening on {})",
            config.self_address, local_addr
        );

        Ok(Self {
            self_address: config.self_address.clone(),
            local_addr,
            endpoint,
            events,
            shutdown_tx: Some(shutdown_tx),
            agent_task,
            server_task,
        })
    }

    pub fn self_address(&self) -> &MemberAddress {
        &self.self_address
    }

    /// Address the heartbeat server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn endpoint(&self) -> &HeartbeatEndpoint {
        &self.endpoint
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Stop the agent loop and the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.agent_task).await;
        self.server_task.abort();
        info!("Node {} stopped", self.self_address);
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.server_task.abort();
        self.agent_task.abort();
    }
}
