//! UDP discovery packets (C10, §4.8): Ping, Pong, FindNode, Neighbours.
//!
//! Wire layout: `hash(32) || signature(65) || packet-type(1) || rlp(body)`.
//! `hash` covers everything after it; `signature` is a recoverable ECDSA
//! signature over `keccak256(packet-type || rlp(body))`, and the sender's
//! [`NodeId`] is recovered from it rather than carried as an explicit field.

use std::net::IpAddr;

use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::endpoint::{NodeEndpoint, NodeId};

/// Discovery packets are UDP-sized: 1280 bytes is the practical ceiling
/// before a Neighbours reply must be split across several packets (§4.8).
pub const MAX_PACKET_SIZE: usize = 1280;

const HASH_LEN: usize = 32;
const SIGNATURE_LEN: usize = 65;
const HEADER_LEN: usize = HASH_LEN + SIGNATURE_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatagramError {
    #[error("packet shorter than the {HEADER_LEN}-byte header")]
    Truncated,
    #[error("digest does not match packet contents")]
    BadHash,
    #[error("signature does not recover to a valid public key")]
    BadSignature,
    #[error("unrecognized packet type byte {0}")]
    UnknownType(u8),
    #[error("rlp decode failed: {0}")]
    Rlp(String),
    #[error("packet has already expired")]
    Expired,
}

impl From<DecoderError> for DatagramError {
    fn from(e: DecoderError) -> Self {
        DatagramError::Rlp(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    pub version: u32,
    pub from: NodeEndpoint,
    pub to: NodeEndpoint,
    pub expiration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    pub to: NodeEndpoint,
    /// Echoes the hash of the Ping this answers, so the sender can match
    /// the reply to its outstanding request (§4.9).
    pub echo_hash: [u8; HASH_LEN],
    pub expiration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindNode {
    pub target: NodeId,
    pub expiration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbour {
    pub endpoint: NodeEndpoint,
    pub id: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbours {
    pub nodes: Vec<Neighbour>,
    pub expiration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Ping(Ping),
    Pong(Pong),
    FindNode(FindNode),
    Neighbours(Neighbours),
}

impl Packet {
    fn type_byte(&self) -> u8 {
        match self {
            Packet::Ping(_) => 0x01,
            Packet::Pong(_) => 0x02,
            Packet::FindNode(_) => 0x03,
            Packet::Neighbours(_) => 0x04,
        }
    }

    fn encode_body(&self) -> Vec<u8> {
        match self {
            Packet::Ping(p) => rlp::encode(p).to_vec(),
            Packet::Pong(p) => rlp::encode(p).to_vec(),
            Packet::FindNode(f) => rlp::encode(f).to_vec(),
            Packet::Neighbours(n) => rlp::encode(n).to_vec(),
        }
    }

    pub fn expiration(&self) -> u64 {
        match self {
            Packet::Ping(p) => p.expiration,
            Packet::Pong(p) => p.expiration,
            Packet::FindNode(f) => f.expiration,
            Packet::Neighbours(n) => n.expiration,
        }
    }

    /// Signs and frames this packet, returning the bytes ready for the
    /// UDP socket.
    pub fn encode(&self, secret: &SecretKey) -> Vec<u8> {
        let secp = Secp256k1::signing_only();
        let mut signed = vec![self.type_byte()];
        signed.extend(self.encode_body());

        let digest = keccak256(&signed);
        let message = Message::from_digest_slice(&digest).expect("32-byte digest");
        let (recovery_id, sig_bytes) = secp
            .sign_ecdsa_recoverable(&message, secret)
            .serialize_compact();

        let mut out = Vec::with_capacity(HEADER_LEN + signed.len());
        out.extend_from_slice(&[0u8; HASH_LEN]); // placeholder, filled below
        out.extend_from_slice(&sig_bytes);
        out.push(recovery_id_to_byte(recovery_id));
        out.extend_from_slice(&signed);

        let outer_hash = keccak256(&out[HASH_LEN..]);
        out[..HASH_LEN].copy_from_slice(&outer_hash);
        out
    }

    /// Validates the hash, recovers the sender's id from the signature,
    /// and decodes the body. Does not check expiration; callers decide
    /// whether to bond with an already-stale packet.
    pub fn decode(raw: &[u8]) -> Result<(Packet, NodeId), DatagramError> {
        if raw.len() < HEADER_LEN + 1 {
            return Err(DatagramError::Truncated);
        }
        let claimed_hash = &raw[..HASH_LEN];
        let signed_region = &raw[HASH_LEN..];
        if keccak256(signed_region) != claimed_hash {
            return Err(DatagramError::BadHash);
        }

        let sig_bytes = &raw[HASH_LEN..HASH_LEN + 64];
        let recovery_byte = raw[HASH_LEN + 64];
        let recovery_id = byte_to_recovery_id(recovery_byte).ok_or(DatagramError::BadSignature)?;
        let sig = RecoverableSignature::from_compact(sig_bytes, recovery_id)
            .map_err(|_| DatagramError::BadSignature)?;

        let message_region = &raw[HEADER_LEN..];
        let digest = keccak256(message_region);
        let message = Message::from_digest_slice(&digest).map_err(|_| DatagramError::BadSignature)?;

        let secp = Secp256k1::verification_only();
        let public_key: PublicKey = secp
            .recover_ecdsa(&message, &sig)
            .map_err(|_| DatagramError::BadSignature)?;
        let sender = NodeId::from_public_key(&public_key);

        let type_byte = message_region[0];
        let body = Rlp::new(&message_region[1..]);
        let packet = match type_byte {
            0x01 => Packet::Ping(Ping::decode(&body)?),
            0x02 => Packet::Pong(Pong::decode(&body)?),
            0x03 => Packet::FindNode(FindNode::decode(&body)?),
            0x04 => Packet::Neighbours(Neighbours::decode(&body)?),
            other => return Err(DatagramError::UnknownType(other)),
        };
        Ok((packet, sender))
    }
}

fn recovery_id_to_byte(id: RecoveryId) -> u8 {
    id.to_i32() as u8
}

fn byte_to_recovery_id(byte: u8) -> Option<RecoveryId> {
    RecoveryId::from_i32(byte as i32).ok()
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&out);
    bytes
}

fn encode_endpoint(stream: &mut RlpStream, ep: &NodeEndpoint) {
    stream.begin_list(3);
    match ep.address {
        IpAddr::V4(v4) => stream.append(&v4.octets().to_vec()),
        IpAddr::V6(v6) => stream.append(&v6.octets().to_vec()),
    };
    stream.append(&ep.udp_port);
    stream.append(&ep.tcp_port);
}

fn decode_endpoint(rlp: &Rlp) -> Result<NodeEndpoint, DecoderError> {
    let addr_bytes: Vec<u8> = rlp.val_at(0)?;
    let address = match addr_bytes.len() {
        4 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(&addr_bytes);
            IpAddr::from(b)
        }
        16 => {
            let mut b = [0u8; 16];
            b.copy_from_slice(&addr_bytes);
            IpAddr::from(b)
        }
        _ => return Err(DecoderError::Custom("bad endpoint address length")),
    };
    Ok(NodeEndpoint {
        address,
        udp_port: rlp.val_at(1)?,
        tcp_port: rlp.val_at(2)?,
    })
}

impl Encodable for Ping {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(4);
        stream.append(&self.version);
        encode_endpoint(stream, &self.from);
        encode_endpoint(stream, &self.to);
        stream.append(&self.expiration);
    }
}

impl Decodable for Ping {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Ping {
            version: rlp.val_at(0)?,
            from: decode_endpoint(&rlp.at(1)?)?,
            to: decode_endpoint(&rlp.at(2)?)?,
            expiration: rlp.val_at(3)?,
        })
    }
}

impl Encodable for Pong {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(3);
        encode_endpoint(stream, &self.to);
        stream.append(&self.echo_hash.to_vec());
        stream.append(&self.expiration);
    }
}

impl Decodable for Pong {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let to = decode_endpoint(&rlp.at(0)?)?;
        let echo_hash_vec: Vec<u8> = rlp.val_at(1)?;
        if echo_hash_vec.len() != HASH_LEN {
            return Err(DecoderError::Custom("echo hash must be 32 bytes"));
        }
        let mut echo_hash = [0u8; HASH_LEN];
        echo_hash.copy_from_slice(&echo_hash_vec);
        Ok(Pong {
            to,
            echo_hash,
            expiration: rlp.val_at(2)?,
        })
    }
}

impl Encodable for FindNode {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(2);
        stream.append(&self.target.0.to_vec());
        stream.append(&self.expiration);
    }
}

impl Decodable for FindNode {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let target_vec: Vec<u8> = rlp.val_at(0)?;
        if target_vec.len() != 64 {
            return Err(DecoderError::Custom("node id must be 64 bytes"));
        }
        let mut target = [0u8; 64];
        target.copy_from_slice(&target_vec);
        Ok(FindNode {
            target: NodeId(target),
            expiration: rlp.val_at(1)?,
        })
    }
}

impl Encodable for Neighbour {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(4);
        match self.endpoint.address {
            IpAddr::V4(v4) => stream.append(&v4.octets().to_vec()),
            IpAddr::V6(v6) => stream.append(&v6.octets().to_vec()),
        };
        stream.append(&self.endpoint.udp_port);
        stream.append(&self.endpoint.tcp_port);
        stream.append(&self.id.0.to_vec());
    }
}

impl Decodable for Neighbour {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let addr_bytes: Vec<u8> = rlp.val_at(0)?;
        let address = match addr_bytes.len() {
            4 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(&addr_bytes);
                IpAddr::from(b)
            }
            16 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(&addr_bytes);
                IpAddr::from(b)
            }
            _ => return Err(DecoderError::Custom("bad endpoint address length")),
        };
        let id_vec: Vec<u8> = rlp.val_at(3)?;
        if id_vec.len() != 64 {
            return Err(DecoderError::Custom("node id must be 64 bytes"));
        }
        let mut id = [0u8; 64];
        id.copy_from_slice(&id_vec);
        Ok(Neighbour {
            endpoint: NodeEndpoint {
                address,
                udp_port: rlp.val_at(1)?,
                tcp_port: rlp.val_at(2)?,
            },
            id: NodeId(id),
        })
    }
}

impl Encodable for Neighbours {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(2);
        stream.begin_list(self.nodes.len());
        for node in &self.nodes {
            node.rlp_append(stream);
        }
        stream.append(&self.expiration);
    }
}

impl Decodable for Neighbours {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let nodes_rlp = rlp.at(0)?;
        let mut nodes = Vec::with_capacity(nodes_rlp.item_count()?);
        for item in nodes_rlp.iter() {
            nodes.push(Neighbour::decode(&item)?);
        }
        Ok(Neighbours {
            nodes,
            expiration: rlp.val_at(1)?,
        })
    }
}

/// Splits a Neighbours list so that each encoded packet stays within
/// [`MAX_PACKET_SIZE`] (§4.8), the way a full bucket reply must be
/// fragmented across several datagrams.
pub fn fragment_neighbours(nodes: &[Neighbour], expiration: u64) -> Vec<Neighbours> {
    const NODES_PER_FRAGMENT: usize = 12; // conservative bound well under the 1280-byte cap

    if nodes.is_empty() {
        return vec![Neighbours {
            nodes: Vec::new(),
            expiration,
        }];
    }
    nodes
        .chunks(NODES_PER_FRAGMENT)
        .map(|chunk| Neighbours {
            nodes: chunk.to_vec(),
            expiration,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> NodeEndpoint {
        NodeEndpoint {
            address: "10.0.0.5".parse().unwrap(),
            udp_port: 30303,
            tcp_port: 30303,
        }
    }

    #[test]
    fn ping_round_trips_through_rlp() {
        let ping = Ping {
            version: 4,
            from: endpoint(),
            to: endpoint(),
            expiration: 1_700_000_000,
        };
        let encoded = rlp::encode(&ping);
        let decoded = Ping::decode(&Rlp::new(&encoded)).unwrap();
        assert_eq!(ping, decoded);
    }

    #[test]
    fn signed_packet_recovers_the_signer() {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
        let expected_id = NodeId::from_public_key(&public);

        let packet = Packet::Ping(Ping {
            version: 4,
            from: endpoint(),
            to: endpoint(),
            expiration: 1_700_000_000,
        });
        let wire = packet.encode(&secret);
        let (decoded, sender) = Packet::decode(&wire).unwrap();
        assert_eq!(sender, expected_id);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn tampered_packet_fails_hash_check() {
        let secp = Secp256k1::new();
        let (secret, _) = secp.generate_keypair(&mut rand::thread_rng());
        let packet = Packet::FindNode(FindNode {
            target: NodeId([9u8; 64]),
            expiration: 1_700_000_000,
        });
        let mut wire = packet.encode(&secret);
        let last = wire.len() - 1;
        wire[last] ^= 0xff;
        assert_eq!(Packet::decode(&wire), Err(DatagramError::BadHash));
    }

    #[test]
    fn neighbours_fragment_under_the_node_cap() {
        let nodes: Vec<Neighbour> = (0..30)
            .map(|i| Neighbour {
                endpoint: endpoint(),
                id: NodeId([i as u8; 64]),
            })
            .collect();
        let fragments = fragment_neighbours(&nodes, 0);
        assert!(fragments.len() > 1);
        let total: usize = fragments.iter().map(|f| f.nodes.len()).sum();
        assert_eq!(total, 30);
    }
}
