//! gossip-daemon library: WebSocket plumbing around the gossip-core agent.
//!
//! This is a thin library layer over the daemon components,
//! allowing integration tests to start real nodes.

pub mod connection;
pub mod message;
pub mod node;
pub mod outgoing;
pub mod server;

// Re-export key types for convenience
pub use message::{MAX_MESSAGE_SIZE, RpcMessage};
pub use node::Node;
pub use outgoing::WebSocketTransport;
pub use server::HeartbeatServer;
