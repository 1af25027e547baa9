//! The host (C15, §4.13): owns the runtime driver, the TCP acceptor, the
//! node table, the peer registry, and the capability registry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use net_core::node_table::{ALPHA, BUCKET_SIZE, REFRESH_INTERVAL, SWEEP_INTERVAL};
use net_core::{Lookup, NodeEndpoint, NodeId, NodeTable};
use rand::RngCore;
use tokio::net::{TcpListener, UdpSocket};
use tokio::time::interval;

use crate::capability::Capability;
use crate::session::{DisconnectReason, SessionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerType {
    Required,
    Optional,
}

#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub id: NodeId,
    pub endpoint: NodeEndpoint,
    pub peer_type: PeerType,
    pub failed_attempts: u32,
    pub last_attempted: Option<Instant>,
    pub last_disconnect_reason: Option<DisconnectReason>,
}

impl PeerRecord {
    pub fn new(id: NodeId, endpoint: NodeEndpoint, peer_type: PeerType) -> Self {
        PeerRecord {
            id,
            endpoint,
            peer_type,
            failed_attempts: 0,
            last_attempted: None,
            last_disconnect_reason: None,
        }
    }

    /// §4.13's backoff schedule: roughly linear for transient failures,
    /// longer for a voluntary quit, and effectively permanent for a
    /// reason [`DisconnectReason::is_useless`] judges critical.
    fn backoff(&self) -> Duration {
        let attempts = self.failed_attempts.max(1) as u64;
        match self.last_disconnect_reason {
            Some(reason) if reason.is_useless() => Duration::from_secs(360 * 24 * 60 * 60),
            Some(DisconnectReason::ClientQuit) | Some(DisconnectReason::UserReason) => Duration::from_secs(25 * attempts),
            _ => Duration::from_secs(15 * attempts),
        }
    }

    pub fn should_reconnect(&self, now: Instant) -> bool {
        match self.last_attempted {
            None => true,
            Some(last) => now.duration_since(last) >= self.backoff(),
        }
    }

    pub fn record_attempt(&mut self) {
        self.last_attempted = Some(Instant::now());
    }

    pub fn record_disconnect(&mut self, reason: DisconnectReason) {
        self.failed_attempts += 1;
        self.last_disconnect_reason = Some(reason);
    }

    pub fn record_success(&mut self) {
        self.failed_attempts = 0;
        self.last_disconnect_reason = None;
    }
}

/// Egress/ingress connection budget (§4.13).
pub struct SlotPolicy {
    pub ideal_peer_count: usize,
    pub ingress_stretch: f64,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        SlotPolicy {
            ideal_peer_count: 11,
            ingress_stretch: 7.0 / 11.0,
        }
    }
}

impl SlotPolicy {
    pub fn egress_budget(&self) -> usize {
        self.ideal_peer_count
    }

    pub fn ingress_budget(&self) -> usize {
        ((self.ideal_peer_count as f64) * self.ingress_stretch).round() as usize
    }
}

pub const PING_INTERVAL: Duration = Duration::from_secs(30);
pub const PING_GRACE: Duration = Duration::from_secs(1);
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

pub struct Host {
    pub node_table: NodeTable,
    pub sessions: SessionRegistry,
    pub peers: HashMap<NodeId, PeerRecord>,
    pub capabilities: Vec<Arc<dyn Capability>>,
    pub slot_policy: SlotPolicy,
    tcp_listener: Option<TcpListener>,
    udp_socket: Option<UdpSocket>,
    last_ping_broadcast: Option<Instant>,
    last_peer_count_log: Option<Instant>,
    last_table_sweep: Option<Instant>,
    last_table_refresh: Option<Instant>,
}

impl Host {
    pub fn new(local_id: NodeId) -> Self {
        Host {
            node_table: NodeTable::new(local_id),
            sessions: SessionRegistry::new(),
            peers: HashMap::new(),
            capabilities: Vec::new(),
            slot_policy: SlotPolicy::default(),
            tcp_listener: None,
            udp_socket: None,
            last_ping_broadcast: None,
            last_peer_count_log: None,
            last_table_sweep: None,
            last_table_refresh: None,
        }
    }

    pub fn register_capability(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities.push(capability);
    }

    /// Lifecycle step 1: bind the TCP acceptor and UDP discovery socket.
    pub async fn start(&mut self, tcp_addr: SocketAddr, udp_addr: SocketAddr) -> std::io::Result<()> {
        self.tcp_listener = Some(TcpListener::bind(tcp_addr).await?);
        self.udp_socket = Some(UdpSocket::bind(udp_addr).await?);
        tracing::info!(%tcp_addr, %udp_addr, "host started");
        Ok(())
    }

    /// Lifecycle step 3: release sockets and drop sessions. Real shutdown
    /// also waits for in-flight handshakes and cancels capability
    /// background timers, both of which are owned by the caller's runtime
    /// handle rather than this struct.
    pub fn stop(&mut self) {
        self.tcp_listener = None;
        self.udp_socket = None;
        self.sessions = SessionRegistry::new();
        tracing::info!("host stopped");
    }

    /// Lifecycle step 2, one tick (§4.13): called on a 100ms cadence by
    /// the caller's runtime loop.
    pub fn tick(&mut self) {
        let now = Instant::now();

        if self.last_ping_broadcast.map(|t| now.duration_since(t) >= PING_INTERVAL).unwrap_or(true) {
            for (_, session) in self.sessions.iter_mut() {
                session.last_ping_sent = Some(now);
            }
            self.last_ping_broadcast = Some(now);
        }

        let timed_out: Vec<NodeId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_ping_overdue(PING_INTERVAL + PING_GRACE))
            .map(|(id, _)| *id)
            .collect();
        for id in timed_out {
            self.drop_session(&id, DisconnectReason::PingTimeout);
        }

        if self
            .last_peer_count_log
            .map(|t| now.duration_since(t) >= Duration::from_secs(30))
            .unwrap_or(true)
        {
            tracing::info!(active = self.sessions.len(), "active peer count");
            self.last_peer_count_log = Some(now);
        }

        if self.last_table_sweep.map(|t| now.duration_since(t) >= SWEEP_INTERVAL).unwrap_or(true) {
            let dropped = self.node_table.sweep_timed_out_pings();
            if !dropped.is_empty() {
                tracing::debug!(count = dropped.len(), "discovery pings timed out");
            }
            self.last_table_sweep = Some(now);
        }

        if self.last_table_refresh.map(|t| now.duration_since(t) >= REFRESH_INTERVAL).unwrap_or(true) {
            self.refresh_node_table();
            self.last_table_refresh = Some(now);
        }

        self.attempt_outbound_connections(now);
    }

    /// Lookup-driven self-healing sweep of the routing table (§4.9
    /// doDiscover), run on [`REFRESH_INTERVAL`]. Queries the table itself
    /// rather than issuing FindNode datagrams: the caller's runtime owns
    /// the UDP socket and is expected to drive the wire exchange that
    /// actually populates the table with fresh entries.
    fn refresh_node_table(&mut self) {
        let mut target_bytes = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut target_bytes);
        let target = NodeId(target_bytes);

        let seed = self.node_table.closest_to(&target, ALPHA);
        if seed.is_empty() {
            return;
        }
        let mut lookup = Lookup::new(target, seed);
        loop {
            let batch = lookup.next_round();
            if batch.is_empty() {
                break;
            }
            for entry in &batch {
                lookup.mark_queried(&entry.id);
            }
            let found = self.node_table.closest_to(&target, BUCKET_SIZE);
            if !lookup.merge(found) {
                break;
            }
        }
    }

    fn attempt_outbound_connections(&mut self, now: Instant) {
        let current = self.sessions.len();
        let budget = self.slot_policy.egress_budget();
        if current >= budget {
            return;
        }
        let mut slots = budget - current;
        let mut candidates: Vec<NodeId> = self
            .peers
            .values()
            .filter(|p| !self.sessions.get(&p.id).is_some() && p.should_reconnect(now))
            .map(|p| p.id)
            .collect();
        // required peers dial first, matching the `required = sessions with
        // PeerType::Required` accounting the tick keeps.
        candidates.sort_by_key(|id| match self.peers[id].peer_type {
            PeerType::Required => 0,
            PeerType::Optional => 1,
        });
        for id in candidates {
            if slots == 0 {
                break;
            }
            if let Some(record) = self.peers.get_mut(&id) {
                record.record_attempt();
            }
            slots -= 1;
            // Actual dialing is done by the caller's runtime (it owns the
            // handshake future); this only marks the attempt and leaves
            // the candidate list for it to drain.
        }
    }

    pub fn drop_session(&mut self, peer: &NodeId, reason: DisconnectReason) {
        if let Some(mut session) = self.sessions.remove(peer) {
            if reason == DisconnectReason::BadProtocol {
                session.penalize_bad_protocol();
            }
        }
        if let Some(record) = self.peers.get_mut(peer) {
            record.record_disconnect(reason);
        }
        tracing::debug!(?reason, "session dropped");
    }

    pub fn required_peer_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|(id, _)| matches!(self.peers.get(id).map(|p| p.peer_type), Some(PeerType::Required)))
            .count()
    }

    /// Ingress connections past the budget are accepted only long enough
    /// to send `TooManyPeers` (§4.13).
    pub fn accepts_more_ingress(&self) -> bool {
        self.sessions.len() < self.slot_policy.ingress_budget()
    }
}

pub fn tick_loop_interval() -> tokio::time::Interval {
    interval(TICK_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> NodeEndpoint {
        NodeEndpoint {
            address: "127.0.0.1".parse().unwrap(),
            udp_port: 30303,
            tcp_port: 30303,
        }
    }

    #[test]
    fn fresh_peer_record_always_reconnects() {
        let record = PeerRecord::new(NodeId([1u8; 64]), endpoint(), PeerType::Optional);
        assert!(record.should_reconnect(Instant::now()));
    }

    #[test]
    fn useless_disconnect_reason_blocks_reconnection_for_a_long_time() {
        let mut record = PeerRecord::new(NodeId([1u8; 64]), endpoint(), PeerType::Optional);
        record.record_disconnect(DisconnectReason::BadProtocol);
        record.record_attempt();
        assert!(!record.should_reconnect(Instant::now()));
    }

    #[test]
    fn slot_policy_defaults_match_the_documented_ratios() {
        let policy = SlotPolicy::default();
        assert_eq!(policy.egress_budget(), 11);
        assert_eq!(policy.ingress_budget(), 7);
    }

    #[test]
    fn tick_sweeps_and_refreshes_the_node_table() {
        let mut host = Host::new(NodeId([0u8; 64]));
        host.node_table.note_active(NodeId([1u8; 64]), endpoint());
        host.node_table.start_ping(NodeId([2u8; 64]), [9u8; 32], None);

        host.tick();

        assert!(host.last_table_sweep.is_some());
        assert!(host.last_table_refresh.is_some());
        // refreshing must not disturb entries that were never part of a
        // timed-out ping.
        assert!(host.node_table.contains(&NodeId([1u8; 64])));
    }
}
