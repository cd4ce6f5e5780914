//! Observer channel for membership changes.
//!
//! The hosting application subscribes to `MembershipEvent`s on an `EventBus`
//! to react when a peer is presumed dead or comes back. Callbacks run on the
//! agent's task, so they should be quick (forward to a channel if not).

use crate::MemberAddress;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Membership transitions surfaced to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MembershipEvent {
    /// Member moved from the active set to the dead set.
    MemberLost { address: MemberAddress },
    /// Member moved from the dead set back to the active set.
    MemberResurrected { address: MemberAddress },
}

type Observer = Arc<dyn Fn(&MembershipEvent) + Send + Sync>;

/// Keeps an observer registered until dropped.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.observers().remove(&self.id);
        }
    }
}

/// Fan-out point for membership transitions. Wrap in `Arc` to subscribe.
#[derive(Default)]
pub struct EventBus {
    observers: Mutex<BTreeMap<u64, Observer>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn observers(&self) -> MutexGuard<'_, BTreeMap<u64, Observer>> {
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an observer. Observers are called in subscription order.
    pub fn subscribe(
        self: &Arc<Self>,
        observer: impl Fn(&MembershipEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers().insert(id, Arc::new(observer));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    /// Deliver `event` to every current observer and return how many saw it.
    ///
    /// The lock is released before any observer runs, so an observer may
    /// subscribe or drop its own `Subscription`.
    pub fn emit(&self, event: &MembershipEvent) -> usize {
        let observers: Vec<Observer> = self.observers().values().cloned().collect();
        for observer in &observers {
            observer(event);
        }
        observers.len()
    }
}
