//! `saveNetwork` / `restoreNetwork` (§6.6): a JSON snapshot of the peer
//! registry and node id, reloaded on the next start so the host does not
//! have to rediscover its whole neighbourhood from scratch.

use std::net::IpAddr;

use net_core::{NodeEndpoint, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::{Host, PeerRecord, PeerType};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize, Deserialize)]
struct PersistedEndpoint {
    address: IpAddr,
    udp_port: u16,
    tcp_port: u16,
}

impl From<NodeEndpoint> for PersistedEndpoint {
    fn from(ep: NodeEndpoint) -> Self {
        PersistedEndpoint {
            address: ep.address,
            udp_port: ep.udp_port,
            tcp_port: ep.tcp_port,
        }
    }
}

impl From<PersistedEndpoint> for NodeEndpoint {
    fn from(ep: PersistedEndpoint) -> Self {
        NodeEndpoint {
            address: ep.address,
            udp_port: ep.udp_port,
            tcp_port: ep.tcp_port,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedPeer {
    id: String, // hex-encoded 64-byte node id
    endpoint: PersistedEndpoint,
    required: bool,
}

#[derive(Serialize, Deserialize)]
struct NetworkSnapshot {
    local_id: String,
    peers: Vec<PersistedPeer>,
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode_64(s: &str) -> Option<[u8; 64]> {
    if s.len() != 128 {
        return None;
    }
    let mut out = [0u8; 64];
    for i in 0..64 {
        out[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

/// Serializes the current peer registry to JSON.
pub fn save_network(host: &Host, local_id: NodeId) -> Result<String, PersistenceError> {
    let peers = host
        .peers
        .values()
        .map(|p| PersistedPeer {
            id: hex_encode(&p.id.0),
            endpoint: p.endpoint.into(),
            required: matches!(p.peer_type, PeerType::Required),
        })
        .collect();
    let snapshot = NetworkSnapshot {
        local_id: hex_encode(&local_id.0),
        peers,
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

/// Reloads a snapshot produced by [`save_network`], merging its peers
/// into `host`'s registry (existing entries for the same id are kept,
/// since they may carry live backoff state).
pub fn restore_network(host: &mut Host, json: &str) -> Result<(), PersistenceError> {
    let snapshot: NetworkSnapshot = serde_json::from_str(json)?;
    for peer in snapshot.peers {
        let Some(id_bytes) = hex_decode_64(&peer.id) else {
            continue;
        };
        let id = NodeId(id_bytes);
        host.peers.entry(id).or_insert_with(|| {
            PeerRecord::new(
                id,
                peer.endpoint.into(),
                if peer.required { PeerType::Required } else { PeerType::Optional },
            )
        });
    }
    Ok(())
}

pub fn decode_local_id(json: &str) -> Result<Option<NodeId>, PersistenceError> {
    let snapshot: NetworkSnapshot = serde_json::from_str(json)?;
    Ok(hex_decode_64(&snapshot.local_id).map(NodeId))
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
    fn round_trips_a_peer_registry() {
        let local_id = NodeId([1u8; 64]);
        let mut host = Host::new(local_id);
        let peer_id = NodeId([2u8; 64]);
        host.peers.insert(peer_id, PeerRecord::new(peer_id, endpoint(), PeerType::Required));

        let json = save_network(&host, local_id).unwrap();

        let mut restored = Host::new(local_id);
        restore_network(&mut restored, &json).unwrap();
        assert!(restored.peers.contains_key(&peer_id));
        assert_eq!(restored.peers[&peer_id].peer_type, PeerType::Required);
    }
}
