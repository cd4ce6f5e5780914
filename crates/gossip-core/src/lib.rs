//! gossip-core: Heartbeat-based failure detection for a statically configured peer group.
//!
//! This crate provides:
//! - Per-member watchdog timers that signal when a peer falls silent
//! - The membership view (active and presumed-dead partitions)
//! - The agent event loop that arbitrates timeouts, gossip ticks and inbound heartbeats
//! - The heartbeat endpoint and transport trait used by network adapters

pub mod address;
pub mod agent;
pub mod config;
pub mod endpoint;
pub mod events;
pub mod fanout;
pub mod member;
pub mod transport;
pub mod view;
pub mod watchdog;

pub use address::{AddressError, MemberAddress};
pub use agent::Agent;
pub use config::{AgentConfig, ConfigError};
pub use endpoint::{EndpointError, HeartbeatEndpoint};
pub use events::{EventBus, MembershipEvent, Subscription};
pub use member::Member;
pub use transport::{HeartbeatTransport, TransportError};
pub use view::{HeartbeatOutcome, MembershipError, MembershipSnapshot, MembershipView, TimeoutOutcome};
pub use watchdog::{LostMember, Watchdog, WatchdogState};
