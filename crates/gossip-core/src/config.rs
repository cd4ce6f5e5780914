//! Agent configuration loading.
//!
//! The configuration is a JSON record naming our own address, the static peer
//! list and the two timing intervals. It is read once before the agent starts;
//! any failure here is fatal to startup.

use crate::MemberAddress;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} must be a positive number of milliseconds")]
    InvalidInterval(&'static str),
}

/// Static configuration for one agent.
///
/// ```json
/// {
///   "selfAddress": "127.0.0.1:8001",
///   "peerAddresses": ["127.0.0.1:8001", "127.0.0.1:8002"],
///   "gossipIntervalMs": 1000,
///   "cleanupIntervalMs": 5000
/// }
/// ```
///
/// The older `MyAddress` / `Servers` / `Gossip` / `Cleanup` keys are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Address peers use to reach us; also excluded from fan-out
    #[serde(alias = "MyAddress")]
    pub self_address: MemberAddress,

    /// Every peer we track; all start in the active set
    #[serde(alias = "Servers", default)]
    pub peer_addresses: Vec<MemberAddress>,

    /// Period between outbound heartbeats
    #[serde(alias = "Gossip")]
    pub gossip_interval_ms: u64,

    /// Silence after which a peer is presumed dead
    #[serde(alias = "Cleanup")]
    pub cleanup_interval_ms: u64,
}

impl AgentConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&content)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse and validate a configuration from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gossip_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("gossipIntervalMs"));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("cleanupIntervalMs"));
        }
        Ok(())
    }

    pub fn gossip_interval(&self) -> Duration {
        Duration::from_millis(self.gossip_interval_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}
