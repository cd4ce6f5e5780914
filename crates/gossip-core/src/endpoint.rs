//! Heartbeat endpoint: the inbound side of the heartbeat call.
//!
//! Network adapters hold a cloned `HeartbeatEndpoint` and call `receive` for
//! every heartbeat they decode. The endpoint never touches the membership view
//! itself; it enqueues the request for the agent loop and waits for its verdict.

use crate::view::{HeartbeatOutcome, MembershipError, MembershipSnapshot};
use crate::MemberAddress;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Depth of the queue between endpoints and the agent loop.
pub const REQUEST_QUEUE_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("heartbeat carried no sender address")]
    MissingSender,

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error("agent is not running")]
    AgentStopped,
}

/// Requests served by the agent loop.
#[derive(Debug)]
pub(crate) enum AgentRequest {
    Heartbeat {
        from: MemberAddress,
        reply: oneshot::Sender<Result<HeartbeatOutcome, MembershipError>>,
    },
    Snapshot {
        reply: oneshot::Sender<MembershipSnapshot>,
    },
}

/// Cloneable handle for delivering heartbeats to an agent.
#[derive(Debug, Clone)]
pub struct HeartbeatEndpoint {
    request_tx: mpsc::Sender<AgentRequest>,
}

impl HeartbeatEndpoint {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<AgentRequest>) {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        (Self { request_tx }, request_rx)
    }

    /// Handle a heartbeat from `sender`.
    ///
    /// An empty sender is rejected before anything reaches the agent. A
    /// sender that is not a valid address cannot have been configured, so it
    /// is reported as an unknown member.
    pub async fn receive(&self, sender: &str) -> Result<HeartbeatOutcome, EndpointError> {
        if sender.trim().is_empty() {
            return Err(EndpointError::MissingSender);
        }

        let from: MemberAddress = sender
            .parse()
            .map_err(|_| MembershipError::UnknownMember(sender.to_string()))?;

        let (reply, reply_rx) = oneshot::channel();
        self.request_tx
            .send(AgentRequest::Heartbeat { from, reply })
            .await
            .map_err(|_| EndpointError::AgentStopped)?;

        let outcome = reply_rx.await.map_err(|_| EndpointError::AgentStopped)??;
        Ok(outcome)
    }

    /// Current membership as seen by the agent.
    pub async fn snapshot(&self) -> Result<MembershipSnapshot, EndpointError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request_tx
            .send(AgentRequest::Snapshot { reply })
            .await
            .map_err(|_| EndpointError::AgentStopped)?;

        reply_rx.await.map_err(|_| EndpointError::AgentStopped)
    }
}
