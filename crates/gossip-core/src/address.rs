//! MemberAddress: network identity of a peer in the membership view.
//!
//! Addresses are `host:port` strings. They are the map key of the view and
//! the correlation key for every timer and heartbeat event.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Member address is empty")]
    Empty,
    #[error("Member address has no port: {0}")]
    MissingPort(String),
    #[error("Member address has an invalid port: {0}")]
    InvalidPort(String),
    #[error("Member address has an empty host: {0}")]
    EmptyHost(String),
}

/// Address of a known peer, in `host:port` form.
///
/// # Examples
/// ```
/// use gossip_core::MemberAddress;
///
/// let addr: MemberAddress = "127.0.0.1:7946".parse().unwrap();
/// assert_eq!(addr.port(), 7946);
/// assert_eq!(addr.to_string(), "127.0.0.1:7946");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberAddress {
    raw: String,
    port: u16,
}

impl MemberAddress {
    /// The address as it was configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Display for MemberAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for MemberAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;

        if host.is_empty() {
            return Err(AddressError::EmptyHost(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;

        Ok(Self {
            raw: s.to_string(),
            port,
        })
    }
}

// Serialize as the plain address string in config files and logs
impl serde::Serialize for MemberAddress {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.raw)
    }
}

impl<'de> serde::Deserialize<'de> for MemberAddress {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
