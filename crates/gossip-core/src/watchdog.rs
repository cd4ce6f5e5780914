//! Per-member watchdog timer.
//!
//! A watchdog is a one-shot countdown running on its own tokio task. When the
//! timeout elapses it reports the member as lost on the agent's lost-event
//! queue; when cancelled first it exits silently. The two outcomes race through
//! a compare-and-swap on a shared state word, so exactly one of them wins.

use crate::MemberAddress;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

const RUNNING: u8 = 0;
const EXPIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Lifecycle state of a watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Counting down
    Running,
    /// Timeout elapsed and the lost signal was emitted (terminal)
    Expired,
    /// Cancelled before expiry, nothing emitted (terminal)
    Cancelled,
}

impl WatchdogState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            RUNNING => Self::Running,
            EXPIRED => Self::Expired,
            _ => Self::Cancelled,
        }
    }
}

/// Signal emitted by an expired watchdog.
///
/// `generation` identifies which watchdog run produced the signal. The agent
/// discards signals whose generation no longer matches the member's current
/// watchdog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostMember {
    pub address: MemberAddress,
    pub generation: u64,
}

/// Handle to a running countdown for one member.
///
/// Dropping the handle cancels the countdown.
pub struct Watchdog {
    generation: u64,
    timeout: Duration,
    state: Arc<AtomicU8>,
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Watchdog {
    /// Start a countdown of `timeout` for `address`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        address: MemberAddress,
        generation: u64,
        timeout: Duration,
        lost_tx: mpsc::UnboundedSender<LostMember>,
    ) -> Self {
        let state = Arc::new(AtomicU8::new(RUNNING));
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    if task_state
                        .compare_exchange(RUNNING, EXPIRED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        debug!("Member {} lost (generation {})", address, generation);
                        let _ = lost_tx.send(LostMember { address, generation });
                    }
                }
                _ = cancel_rx => {
                    trace!("Watchdog for {} cancelled (generation {})", address, generation);
                }
            }
        });

        Self {
            generation,
            timeout,
            state,
            cancel_tx: Some(cancel_tx),
            task,
        }
    }

    /// Cancel the countdown.
    ///
    /// Returns true if this call stopped a running countdown, false if the
    /// watchdog had already expired or been cancelled.
    pub fn cancel(&mut self) -> bool {
        let won = self
            .state
            .compare_exchange(RUNNING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        // Wake the task so it exits instead of sleeping out the timeout
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }

        won
    }

    pub fn state(&self) -> WatchdogState {
        WatchdogState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == WatchdogState::Running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the underlying task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("generation", &self.generation)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish()
    }
}
