//! A known peer and its timing configuration.

use crate::MemberAddress;
use crate::watchdog::{LostMember, Watchdog};
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::mpsc;

/// A member of the peer group.
///
/// Two members are equal iff their addresses are equal; intervals and the
/// watchdog handle do not participate.
#[derive(Debug)]
pub struct Member {
    address: MemberAddress,
    /// How often this member is expected to announce itself
    heartbeat_interval: Duration,
    /// Silence after which the member is presumed dead
    timeout_interval: Duration,
    /// Countdown for this member, present only while it is in the active set
    watchdog: Option<Watchdog>,
}

impl Member {
    pub fn new(address: MemberAddress, heartbeat_interval: Duration, timeout_interval: Duration) -> Self {
        Self {
            address,
            heartbeat_interval,
            timeout_interval,
            watchdog: None,
        }
    }

    pub fn address(&self) -> &MemberAddress {
        &self.address
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn set_heartbeat_interval(&mut self, interval: Duration) {
        self.heartbeat_interval = interval;
    }

    pub fn timeout_interval(&self) -> Duration {
        self.timeout_interval
    }

    pub fn set_timeout_interval(&mut self, interval: Duration) {
        self.timeout_interval = interval;
    }

    pub fn watchdog(&self) -> Option<&Watchdog> {
        self.watchdog.as_ref()
    }

    pub fn has_watchdog(&self) -> bool {
        self.watchdog.is_some()
    }

    /// Generation of the current watchdog, if one is attached.
    pub fn watchdog_generation(&self) -> Option<u64> {
        self.watchdog.as_ref().map(Watchdog::generation)
    }

    /// Start a countdown using this member's timeout interval.
    ///
    /// Any previous watchdog is cancelled first.
    pub fn start_watchdog(&mut self, generation: u64, lost_tx: mpsc::UnboundedSender<LostMember>) {
        self.stop_watchdog();
        self.watchdog = Some(Watchdog::start(
            self.address.clone(),
            generation,
            self.timeout_interval,
            lost_tx,
        ));
    }

    /// Reset the countdown: cancel the running watchdog and start a fresh one,
    /// optionally with a new timeout interval.
    pub fn restart_watchdog(
        &mut self,
        generation: u64,
        timeout: Option<Duration>,
        lost_tx: mpsc::UnboundedSender<LostMember>,
    ) {
        if let Some(timeout) = timeout {
            self.timeout_interval = timeout;
        }
        self.start_watchdog(generation, lost_tx);
    }

    /// Cancel and detach the watchdog.
    ///
    /// Returns true if a running countdown was stopped.
    pub fn stop_watchdog(&mut self) -> bool {
        match self.watchdog.take() {
            Some(mut watchdog) => watchdog.cancel(),
            None => false,
        }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl Display for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Member: {}; Heartbeat: {}ms; Timeout: {}ms",
            self.address,
            self.heartbeat_interval.as_millis(),
            self.timeout_interval.as_millis()
        )
    }
}
