//! Membership view: which known peers are believed alive and which are presumed dead.
//!
//! The view is owned by the agent event loop and is never shared. Watchdogs
//! and the heartbeat endpoint only enqueue events; every transition between
//! the active and dead partitions happens here, on the agent's task.

use crate::watchdog::LostMember;
use crate::{Member, MemberAddress};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("unknown member {0}")]
    UnknownMember(String),
}

/// Result of applying a heartbeat to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Member was active; its watchdog was restarted
    Refreshed,
    /// Member was presumed dead and is active again
    Resurrected,
}

/// Result of applying a watchdog expiry to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// Member moved from active to dead
    MarkedDead,
    /// Signal came from a watchdog that has since been replaced, or the
    /// member is no longer active; nothing changed
    Stale,
}

/// Point-in-time copy of both partitions, sorted by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipSnapshot {
    pub active: Vec<MemberAddress>,
    pub dead: Vec<MemberAddress>,
}

/// Active and dead partitions of the known peer group.
///
/// An address lives in at most one partition and, once known, is never
/// forgotten.
pub struct MembershipView {
    active: HashMap<MemberAddress, Member>,
    dead: HashMap<MemberAddress, Member>,
    /// Next watchdog generation to hand out
    next_generation: u64,
    /// Queue every watchdog reports expiry on
    lost_tx: mpsc::UnboundedSender<LostMember>,
}

impl MembershipView {
    pub fn new(lost_tx: mpsc::UnboundedSender<LostMember>) -> Self {
        Self {
            active: HashMap::new(),
            dead: HashMap::new(),
            next_generation: 1,
            lost_tx,
        }
    }

    /// Add a configured peer to the active set.
    ///
    /// The watchdog is not started here; call `start_watchdogs` once the
    /// view is populated. Returns false if the address is already known.
    pub fn insert_peer(&mut self, member: Member) -> bool {
        let address = member.address().clone();
        if self.contains(&address) {
            return false;
        }
        self.active.insert(address, member);
        true
    }

    /// Start a watchdog for every active member that has none.
    pub fn start_watchdogs(&mut self) {
        let pending: Vec<MemberAddress> = self
            .active
            .iter()
            .filter(|(_, m)| !m.has_watchdog())
            .map(|(addr, _)| addr.clone())
            .collect();

        for address in pending {
            let generation = self.bump_generation();
            if let Some(member) = self.active.get_mut(&address) {
                member.start_watchdog(generation, self.lost_tx.clone());
            }
        }
    }

    /// Cancel every running watchdog.
    pub fn stop_watchdogs(&mut self) {
        for member in self.active.values_mut() {
            member.stop_watchdog();
        }
    }

    /// Apply a heartbeat from `address`.
    ///
    /// An active member gets its countdown reset; a dead member is moved back
    /// to the active set with a fresh countdown. Unknown addresses are
    /// rejected without touching either partition.
    pub fn on_heartbeat_received(
        &mut self,
        address: &MemberAddress,
    ) -> Result<HeartbeatOutcome, MembershipError> {
        if self.active.contains_key(address) {
            let generation = self.bump_generation();
            if let Some(member) = self.active.get_mut(address) {
                member.restart_watchdog(generation, None, self.lost_tx.clone());
            }
            return Ok(HeartbeatOutcome::Refreshed);
        }

        if let Some(mut member) = self.dead.remove(address) {
            let generation = self.bump_generation();
            member.start_watchdog(generation, self.lost_tx.clone());
            self.active.insert(address.clone(), member);
            return Ok(HeartbeatOutcome::Resurrected);
        }

        Err(MembershipError::UnknownMember(address.to_string()))
    }

    /// Apply a watchdog expiry.
    ///
    /// Only the member's current watchdog may move it to the dead set; a
    /// signal from a watchdog that a heartbeat already replaced is ignored.
    pub fn on_timeout(&mut self, lost: &LostMember) -> TimeoutOutcome {
        let current = self
            .active
            .get(&lost.address)
            .and_then(Member::watchdog_generation);

        if current != Some(lost.generation) {
            return TimeoutOutcome::Stale;
        }

        match self.active.remove(&lost.address) {
            Some(mut member) => {
                member.stop_watchdog();
                self.dead.insert(lost.address.clone(), member);
                TimeoutOutcome::MarkedDead
            }
            None => TimeoutOutcome::Stale,
        }
    }

    pub fn is_active(&self, address: &MemberAddress) -> bool {
        self.active.contains_key(address)
    }

    pub fn is_dead(&self, address: &MemberAddress) -> bool {
        self.dead.contains_key(address)
    }

    pub fn contains(&self, address: &MemberAddress) -> bool {
        self.is_active(address) || self.is_dead(address)
    }

    pub fn get(&self, address: &MemberAddress) -> Option<&Member> {
        self.active.get(address).or_else(|| self.dead.get(address))
    }

    /// Active addresses in sorted order.
    pub fn active_addresses(&self) -> Vec<MemberAddress> {
        let mut addresses: Vec<_> = self.active.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Dead addresses in sorted order.
    pub fn dead_addresses(&self) -> Vec<MemberAddress> {
        let mut addresses: Vec<_> = self.dead.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            active: self.active_addresses(),
            dead: self.dead_addresses(),
        }
    }

    /// Check the structural invariants: the partitions are disjoint, every
    /// active member holds a watchdog and no dead member does.
    pub fn is_consistent(&self) -> bool {
        let disjoint = self.active.keys().all(|addr| !self.dead.contains_key(addr));
        let active_watched = self.active.values().all(Member::has_watchdog);
        let dead_unwatched = self.dead.values().all(|m| !m.has_watchdog());
        disjoint && active_watched && dead_unwatched
    }

    fn bump_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }
}
