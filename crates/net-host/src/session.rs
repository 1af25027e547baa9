//! A live, handshaken connection to one peer (C14, §4.12).

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use net_core::NodeId;
use net_rlpx::FrameCodec;

/// p2p-layer packet ids (§4.12): `[0x00, 0x10)` is reserved, everything
/// else is partitioned across negotiated capabilities.
pub mod p2p {
    pub const HELLO: u8 = 0x00;
    pub const DISCONNECT: u8 = 0x01;
    pub const PING: u8 = 0x02;
    pub const PONG: u8 = 0x03;
    pub const RESERVED_RANGE_END: u8 = 0x10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    TcpError,
    PingTimeout,
    TooManyPeers,
    ClientQuit,
    UserReason,
    BadProtocol,
    UselessPeer,
    IncompatibleProtocol,
    NullIdentity,
    Requested,
}

impl DisconnectReason {
    /// §4.13: critical reasons push a peer's backoff out to effectively
    /// forever rather than the normal linear schedule.
    pub fn is_useless(self) -> bool {
        matches!(
            self,
            DisconnectReason::BadProtocol
                | DisconnectReason::UselessPeer
                | DisconnectReason::IncompatibleProtocol
                | DisconnectReason::NullIdentity
        )
    }

    pub fn code(self) -> u8 {
        match self {
            DisconnectReason::Requested => 0x00,
            DisconnectReason::TcpError => 0x01,
            DisconnectReason::BadProtocol => 0x02,
            DisconnectReason::UselessPeer => 0x03,
            DisconnectReason::TooManyPeers => 0x04,
            DisconnectReason::ClientQuit => 0x08,
            DisconnectReason::IncompatibleProtocol => 0x09,
            DisconnectReason::NullIdentity => 0x0a,
            DisconnectReason::PingTimeout => 0x0b,
            DisconnectReason::UserReason => 0x10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NegotiatedCapability {
    pub name: &'static str,
    pub version: u8,
    pub offset: u8,
    pub message_count: u8,
}

/// Tracks a capability's packet-id block so inbound frames can be routed
/// by id alone (§4.12).
pub struct CapabilityTable {
    ranges: Vec<NegotiatedCapability>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        CapabilityTable { ranges: Vec::new() }
    }

    pub fn register(&mut self, cap: NegotiatedCapability) {
        self.ranges.push(cap);
    }

    /// Resolves a raw packet id (already known to be `>= RESERVED_RANGE_END`)
    /// to the owning capability and its rebased id.
    pub fn route(&self, packet_id: u8) -> Option<(&NegotiatedCapability, u8)> {
        self.ranges
            .iter()
            .find(|cap| packet_id >= cap.offset && packet_id < cap.offset + cap.message_count)
            .map(|cap| (cap, packet_id - cap.offset))
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Session {
    pub peer_id: NodeId,
    pub codec: FrameCodec,
    pub capabilities: CapabilityTable,
    pub write_queue: VecDeque<(u16, Vec<u8>)>,
    /// Per-session rating: reset on reconnect.
    pub rating: i32,
    /// Cumulative score across reconnects, never reset.
    pub score: i64,
    pub last_ping_sent: Option<Instant>,
    pub last_packet_received: Instant,
    pub rude: bool,
}

impl Session {
    pub fn new(peer_id: NodeId, codec: FrameCodec) -> Self {
        Session {
            peer_id,
            codec,
            capabilities: CapabilityTable::new(),
            write_queue: VecDeque::new(),
            rating: 0,
            score: 0,
            last_ping_sent: None,
            last_packet_received: Instant::now(),
            rude: false,
        }
    }

    /// Routes an inbound raw packet id to its p2p meaning or its owning
    /// capability (§4.12).
    pub fn route_inbound(&self, packet_id: u8) -> RoutedPacket<'_> {
        if packet_id < p2p::RESERVED_RANGE_END {
            RoutedPacket::P2p(packet_id)
        } else {
            match self.capabilities.route(packet_id) {
                Some((cap, rebased)) => RoutedPacket::Capability(cap, rebased),
                None => RoutedPacket::Unroutable,
            }
        }
    }

    /// Queues a frame for write; the caller drains the queue one entry at
    /// a time to uphold the single-writer-at-a-time invariant.
    pub fn enqueue(&mut self, protocol_id: u16, payload: Vec<u8>) {
        self.write_queue.push_back((protocol_id, payload));
    }

    pub fn note_received(&mut self) {
        self.last_packet_received = Instant::now();
    }

    /// §4.12: on a `BadProtocol` disconnect, halve both rating and score
    /// atomically.
    pub fn penalize_bad_protocol(&mut self) {
        self.rating /= 2;
        self.score /= 2;
    }

    pub fn is_ping_overdue(&self, timeout: std::time::Duration) -> bool {
        match self.last_ping_sent {
            Some(sent) => sent.elapsed() > timeout && self.last_packet_received < sent,
            None => false,
        }
    }
}

pub enum RoutedPacket<'a> {
    P2p(u8),
    Capability(&'a NegotiatedCapability, u8),
    Unroutable,
}

pub struct SessionRegistry {
    sessions: HashMap<NodeId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry { sessions: HashMap::new() }
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.peer_id, session);
    }

    pub fn remove(&mut self, peer: &NodeId) -> Option<Session> {
        self.sessions.remove(peer)
    }

    pub fn get_mut(&mut self, peer: &NodeId) -> Option<&mut Session> {
        self.sessions.get_mut(peer)
    }

    pub fn get(&self, peer: &NodeId) -> Option<&Session> {
        self.sessions.get(peer)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Session)> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut Session)> {
        self.sessions.iter_mut()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_p2p_ids_below_the_reserved_range() {
        let table = CapabilityTable::new();
        assert!(table.route(0x01).is_none());
    }

    #[test]
    fn routes_capability_ids_to_the_owning_capability() {
        let mut table = CapabilityTable::new();
        table.register(NegotiatedCapability {
            name: "eth",
            version: 68,
            offset: 0x10,
            message_count: 17,
        });
        let (cap, rebased) = table.route(0x12).unwrap();
        assert_eq!(cap.name, "eth");
        assert_eq!(rebased, 2);
        assert!(table.route(0x21).is_none());
    }

    #[test]
    fn bad_protocol_halves_rating_and_score() {
        let mut session = Session::new(NodeId([1u8; 64]), test_codec());
        session.rating = 10;
        session.score = 1000;
        session.penalize_bad_protocol();
        assert_eq!(session.rating, 5);
        assert_eq!(session.score, 500);
    }

    fn test_codec() -> FrameCodec {
        use net_rlpx::Handshake;
        use secp256k1::Secp256k1;
        let secp = Secp256k1::new();
        let (initiator_secret, _) = secp.generate_keypair(&mut rand::thread_rng());
        let (recipient_secret, recipient_public) = secp.generate_keypair(&mut rand::thread_rng());
        let mut initiator = Handshake::initiator(initiator_secret, recipient_public);
        let mut recipient = Handshake::recipient(recipient_secret);
        let auth = initiator.write_auth_eip8().unwrap();
        recipient.read_auth(&auth).unwrap();
        let ack = recipient.write_ack_eip8().unwrap();
        initiator.read_ack(&ack).unwrap();
        FrameCodec::new(initiator.derive_secrets().unwrap())
    }
}
