//! Agent: the event loop that owns the membership view.
//!
//! The agent is the only code that mutates the view. It races three event
//! sources with no priority between them:
//! 1. Lost signals from member watchdogs → move the member to the dead set
//! 2. Gossip ticks → announce ourselves to one random active peer
//! 3. Requests from heartbeat endpoints → reset or resurrect the sender

use crate::endpoint::AgentRequest;
use crate::events::{EventBus, MembershipEvent};
use crate::fanout;
use crate::transport::HeartbeatTransport;
use crate::view::{HeartbeatOutcome, MembershipView, TimeoutOutcome};
use crate::watchdog::LostMember;
use crate::{AgentConfig, HeartbeatEndpoint, Member, MemberAddress};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Failure-detection agent for one process.
pub struct Agent<T: HeartbeatTransport> {
    local: MemberAddress,
    view: MembershipView,
    gossip_interval: Duration,
    transport: Arc<T>,
    /// Process-wide random source for fan-out, seeded once
    rng: StdRng,
    events: Arc<EventBus>,
    lost_rx: mpsc::UnboundedReceiver<LostMember>,
    request_rx: mpsc::Receiver<AgentRequest>,
}

impl<T: HeartbeatTransport> Agent<T> {
    /// Build an agent from configuration.
    ///
    /// Every configured peer starts in the active set. Returns the agent and
    /// the endpoint that network adapters use to deliver inbound heartbeats.
    pub fn new(config: &AgentConfig, transport: T) -> (Self, HeartbeatEndpoint) {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let (endpoint, request_rx) = HeartbeatEndpoint::channel();

        let mut view = MembershipView::new(lost_tx);
        for address in &config.peer_addresses {
            let member = Member::new(
                address.clone(),
                config.gossip_interval(),
                config.cleanup_interval(),
            );
            if !view.insert_peer(member) {
                debug!("Ignoring duplicate peer {}", address);
            }
        }

        let agent = Self {
            local: config.self_address.clone(),
            view,
            gossip_interval: config.gossip_interval(),
            transport: Arc::new(transport),
            rng: StdRng::from_os_rng(),
            events: Arc::new(EventBus::new()),
            lost_rx,
            request_rx,
        };

        (agent, endpoint)
    }

    /// Replace the random source (e.g., with a seeded one).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Observer channel for membership transitions.
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn view(&self) -> &MembershipView {
        &self.view
    }

    /// Run the event loop forever.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Run the event loop until `shutdown` completes.
    ///
    /// Watchdogs for every active member are started before the first event
    /// is processed and cancelled when the loop exits.
    pub async fn run_until<F: Future<Output = ()>>(mut self, shutdown: F) {
        self.view.start_watchdogs();
        info!(
            "Agent {} started: {} active member(s), gossip every {:?}",
            self.local,
            self.view.active_count(),
            self.gossip_interval
        );

        let mut gossip = tokio::time::interval_at(
            Instant::now() + self.gossip_interval,
            self.gossip_interval,
        );
        gossip.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(lost) = self.lost_rx.recv() => {
                    self.handle_lost(lost);
                    debug_assert!(self.view.is_consistent());
                }

                _ = gossip.tick() => {
                    self.gossip_tick();
                    debug_assert!(self.view.is_consistent());
                }

                Some(request) = self.request_rx.recv() => {
                    self.handle_request(request);
                    debug_assert!(self.view.is_consistent());
                }

                _ = &mut shutdown => {
                    info!("Agent {} shutting down", self.local);
                    break;
                }
            }
        }

        self.view.stop_watchdogs();
    }

    /// Apply a watchdog expiry.
    pub fn handle_lost(&mut self, lost: LostMember) -> TimeoutOutcome {
        let outcome = self.view.on_timeout(&lost);
        match outcome {
            TimeoutOutcome::MarkedDead => {
                warn!("Member {} lost, marking dead", lost.address);
                self.events.emit(&MembershipEvent::MemberLost {
                    address: lost.address,
                });
            }
            TimeoutOutcome::Stale => {
                trace!(
                    "Ignoring stale timeout for {} (generation {})",
                    lost.address, lost.generation
                );
            }
        }
        outcome
    }

    /// Apply a heartbeat from `from`.
    pub fn handle_heartbeat(
        &mut self,
        from: &MemberAddress,
    ) -> Result<HeartbeatOutcome, crate::MembershipError> {
        let result = self.view.on_heartbeat_received(from);
        match &result {
            Ok(HeartbeatOutcome::Refreshed) => {
                trace!("Received member {} heartbeat", from);
            }
            Ok(HeartbeatOutcome::Resurrected) => {
                info!("Resurrected {} from the dead set", from);
                self.events.emit(&MembershipEvent::MemberResurrected {
                    address: from.clone(),
                });
            }
            Err(e) => {
                debug!("Rejected heartbeat: {}", e);
            }
        }
        result
    }

    /// Announce ourselves to one random active peer.
    ///
    /// Returns the chosen target, or None if this tick was skipped. The send
    /// itself runs on a detached task; its failure is only logged and never
    /// affects the view.
    pub fn gossip_tick(&mut self) -> Option<MemberAddress> {
        let candidates = self.view.active_addresses();
        if candidates.is_empty() {
            debug!("No active members to send a heartbeat to");
            return None;
        }

        let Some(target) = fanout::select_target(&candidates, &self.local, &mut self.rng) else {
            debug!("Failed to choose a member to send a heartbeat to");
            return None;
        };

        let transport = Arc::clone(&self.transport);
        let from = self.local.clone();
        let to = target.clone();
        tokio::spawn(async move {
            match transport.send_heartbeat(&to, &from).await {
                Ok(()) => trace!("Sent heartbeat to {}", to),
                Err(e) => warn!("Failed to send heartbeat to {}: {}", to, e),
            }
        });

        Some(target)
    }

    fn handle_request(&mut self, request: AgentRequest) {
        match request {
            AgentRequest::Heartbeat { from, reply } => {
                let result = self.handle_heartbeat(&from);
                // Caller may have given up waiting; the transition stands regardless
                let _ = reply.send(result);
            }
            AgentRequest::Snapshot { reply } => {
                let _ = reply.send(self.view.snapshot());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{self, TransportError};
    use crate::{EndpointError, MembershipError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Transport that records every heartbeat instead of sending it.
    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<(MemberAddress, MemberAddress)>>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<(MemberAddress, MemberAddress)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HeartbeatTransport for RecordingTransport {
        async fn send_heartbeat(
            &self,
            target: &MemberAddress,
            from: &MemberAddress,
        ) -> transport::Result<()> {
            self.sent.lock().unwrap().push((target.clone(), from.clone()));
            if self.fail {
                return Err(TransportError::ConnectionFailed(format!("{}: refused", target)));
            }
            Ok(())
        }
    }

    fn addr(s: &str) -> MemberAddress {
        s.parse().unwrap()
    }

    fn config(local: &str, peers: &[&str], gossip_ms: u64, cleanup_ms: u64) -> AgentConfig {
        AgentConfig {
            self_address: addr(local),
            peer_addresses: peers.iter().map(|p| addr(p)).collect(),
            gossip_interval_ms: gossip_ms,
            cleanup_interval_ms: cleanup_ms,
        }
    }

    fn agent(cfg: &AgentConfig, transport: RecordingTransport) -> (Agent<RecordingTransport>, HeartbeatEndpoint) {
        let (agent, endpoint) = Agent::new(cfg, transport);
        (agent.with_rng(StdRng::seed_from_u64(42)), endpoint)
    }

    fn collect_events(agent: &Agent<RecordingTransport>) -> (Arc<Mutex<Vec<MembershipEvent>>>, crate::Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sub = agent
            .events()
            .subscribe(move |event| seen_clone.lock().unwrap().push(event.clone()));
        (seen, sub)
    }

    // ==================== Construction ====================

    #[tokio::test]
    async fn test_new_populates_active_set() {
        let cfg = config("self:1", &["self:1", "a:1", "b:1", "a:1"], 100, 500);
        let (agent, _endpoint) = agent(&cfg, RecordingTransport::default());

        assert_eq!(
            agent.view().active_addresses(),
            vec![addr("a:1"), addr("b:1"), addr("self:1")]
        );
        assert_eq!(agent.view().dead_count(), 0);

        let member = agent.view().get(&addr("a:1")).unwrap();
        assert_eq!(member.heartbeat_interval(), Duration::from_millis(100));
        assert_eq!(member.timeout_interval(), Duration::from_millis(500));
    }

    // ==================== Fan-out ====================

    #[tokio::test]
    async fn test_fanout_only_self_never_sends() {
        let cfg = config("self:1", &["self:1"], 100, 500);
        let transport = RecordingTransport::default();
        let (mut agent, _endpoint) = agent(&cfg, transport.clone());

        for _ in 0..50 {
            assert_eq!(agent.gossip_tick(), None);
        }
        tokio::task::yield_now().await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fanout_with_no_active_members() {
        let cfg = config("self:1", &[], 100, 500);
        let transport = RecordingTransport::default();
        let (mut agent, _endpoint) = agent(&cfg, transport.clone());

        assert_eq!(agent.gossip_tick(), None);
        tokio::task::yield_now().await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fanout_sends_own_address_to_peer() {
        let cfg = config("self:1", &["self:1", "a:1", "b:1"], 100, 500);
        let transport = RecordingTransport::default();
        let (mut agent, _endpoint) = agent(&cfg, transport.clone());

        let mut targets = Vec::new();
        for _ in 0..200 {
            if let Some(target) = agent.gossip_tick() {
                assert_ne!(target, addr("self:1"));
                targets.push(target);
            }
        }

        // Let the detached sends run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let sent = transport.sent();
        assert_eq!(sent.len(), targets.len());
        assert!(sent.iter().all(|(to, from)| to != &addr("self:1") && from == &addr("self:1")));
        assert!(targets.contains(&addr("a:1")));
        assert!(targets.contains(&addr("b:1")));
    }

    #[tokio::test]
    async fn test_transport_failure_does_not_touch_view() {
        let cfg = config("self:1", &["a:1"], 100, 500);
        let transport = RecordingTransport::failing();
        let (mut agent, _endpoint) = agent(&cfg, transport.clone());
        agent.view.start_watchdogs();

        assert_eq!(agent.gossip_tick(), Some(addr("a:1")));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(transport.sent().len(), 1);
        assert!(agent.view().is_active(&addr("a:1")));
        assert!(agent.view().is_consistent());
    }

    // ==================== Event handling ====================

    #[tokio::test(start_paused = true)]
    async fn test_lost_member_notifies_observer() {
        let cfg = config("self:1", &["a:1"], 1000, 100);
        let (mut agent, _endpoint) = agent(&cfg, RecordingTransport::default());
        let (seen, _sub) = collect_events(&agent);
        agent.view.start_watchdogs();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let lost = agent.lost_rx.try_recv().unwrap();
        assert_eq!(agent.handle_lost(lost.clone()), TimeoutOutcome::MarkedDead);
        assert_eq!(agent.handle_lost(lost), TimeoutOutcome::Stale);

        assert!(agent.view().is_dead(&addr("a:1")));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![MembershipEvent::MemberLost { address: addr("a:1") }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resurrection_notifies_observer() {
        let cfg = config("self:1", &["a:1"], 1000, 100);
        let (mut agent, _endpoint) = agent(&cfg, RecordingTransport::default());
        let (seen, _sub) = collect_events(&agent);
        agent.view.start_watchdogs();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let lost = agent.lost_rx.try_recv().unwrap();
        agent.handle_lost(lost);

        assert_eq!(
            agent.handle_heartbeat(&addr("a:1")),
            Ok(HeartbeatOutcome::Resurrected)
        );
        assert_eq!(
            agent.handle_heartbeat(&addr("a:1")),
            Ok(HeartbeatOutcome::Refreshed)
        );
        assert!(agent.view().is_consistent());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                MembershipEvent::MemberLost { address: addr("a:1") },
                MembershipEvent::MemberResurrected { address: addr("a:1") },
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_heartbeat_leaves_view_unchanged() {
        let cfg = config("self:1", &["a:1"], 1000, 5000);
        let (mut agent, _endpoint) = agent(&cfg, RecordingTransport::default());
        agent.view.start_watchdogs();
        let before = agent.view().snapshot();

        assert_eq!(
            agent.handle_heartbeat(&addr("z:9")),
            Err(MembershipError::UnknownMember("z:9".to_string()))
        );
        assert_eq!(agent.view().snapshot(), before);
    }

    // ==================== Full loop ====================

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_detects_death_and_resurrection() {
        let cfg = config("self:1", &["a:1", "b:1"], 10_000, 100);
        let (agent, endpoint) = agent(&cfg, RecordingTransport::default());
        let (seen, _sub) = collect_events(&agent);

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(agent.run_until(async {
            let _ = stop_rx.await;
        }));

        // Keep b alive past its original deadline, let a fall silent
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(endpoint.receive("b:1").await, Ok(HeartbeatOutcome::Refreshed));
        tokio::time::sleep(Duration::from_millis(60)).await;

        let snapshot = endpoint.snapshot().await.unwrap();
        assert_eq!(snapshot.active, vec![addr("b:1")]);
        assert_eq!(snapshot.dead, vec![addr("a:1")]);

        assert_eq!(endpoint.receive("a:1").await, Ok(HeartbeatOutcome::Resurrected));
        assert_eq!(
            endpoint.receive("nobody:1").await,
            Err(EndpointError::Membership(MembershipError::UnknownMember(
                "nobody:1".to_string()
            )))
        );

        let snapshot = endpoint.snapshot().await.unwrap();
        assert_eq!(snapshot.active, vec![addr("a:1"), addr("b:1")]);
        assert!(snapshot.dead.is_empty());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                MembershipEvent::MemberLost { address: addr("a:1") },
                MembershipEvent::MemberResurrected { address: addr("a:1") },
            ]
        );

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(endpoint.receive("a:1").await, Err(EndpointError::AgentStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_heartbeat_at_deadline_stays_consistent() {
        let cfg = config("self:1", &["a:1"], 10_000, 100);
        let (agent, endpoint) = agent(&cfg, RecordingTransport::default());

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(agent.run_until(async {
            let _ = stop_rx.await;
        }));

        // Lands on the same instant the watchdog fires; either order is legal
        tokio::time::sleep(Duration::from_millis(100)).await;
        let outcome = endpoint.receive("a:1").await.unwrap();
        assert!(matches!(
            outcome,
            HeartbeatOutcome::Refreshed | HeartbeatOutcome::Resurrected
        ));

        let snapshot = endpoint.snapshot().await.unwrap();
        assert_eq!(snapshot.active, vec![addr("a:1")]);
        assert!(snapshot.dead.is_empty());

        // The loop checks the view after every event; a violation panics the task
        stop_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_gossips_each_interval() {
        let cfg = config("self:1", &["self:1", "a:1"], 100, 10_000);
        let transport = RecordingTransport::default();
        let (agent, _endpoint) = agent(&cfg, transport.clone());

        let handle = tokio::spawn(agent.run_until(tokio::time::sleep(Duration::from_millis(550))));
        handle.await.unwrap();

        // Ticks at 100..=500ms; each tick sends to a unless all 10 draws hit self
        let sent = transport.sent();
        assert!((4..=5).contains(&sent.len()), "sent {} heartbeats", sent.len());
        assert!(sent.iter().all(|(to, from)| to == &addr("a:1") && from == &addr("self:1")));
    }
}
