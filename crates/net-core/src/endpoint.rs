//! Node identity and endpoint value types (C9, §3).

use std::net::IpAddr;

/// The 512-bit uncompressed public key that identifies a peer. Recovered
/// from a discovery packet's signature, never carried as a separate field
/// on the wire (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; 64]);

impl NodeId {
    pub fn from_public_key(key: &secp256k1::PublicKey) -> NodeId {
        let uncompressed = key.serialize_uncompressed();
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&uncompressed[1..]); // drop the 0x04 prefix tag
        NodeId(bytes)
    }

    /// XOR distance to `other`, read as a 512-bit big-endian magnitude;
    /// feeds the bucket-index calculation (§4.9).
    pub fn distance(&self, other: &NodeId) -> [u8; 64] {
        let mut out = [0u8; 64];
        for i in 0..64 {
            out[i] = self.0[i] ^ other.0[i];
        }
        out
    }

    /// `floor(log2(distance))`, i.e. the index of the highest set bit, or
    /// `None` when the two ids are identical. Bucket indices run `[0, 512)`;
    /// only the low `[0, 255)` range is populated in practice since real
    /// node ids cluster on the low 256 bits of meaningful entropy, but the
    /// calculation itself is general.
    pub fn bucket_index(&self, other: &NodeId) -> Option<usize> {
        let distance = self.distance(other);
        for (byte_index, byte) in distance.iter().enumerate() {
            if *byte != 0 {
                let bit_in_byte = 7 - byte.leading_zeros() as usize;
                return Some((63 - byte_index) * 8 + bit_in_byte);
            }
        }
        None
    }
}

/// `{ip, udp_port, tcp_port}` (§3). Mutable only through packets that pass
/// the endpoint-proof predicate (a completed Ping/Pong round-trip).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEndpoint {
    pub address: IpAddr,
    pub udp_port: u16,
    pub tcp_port: u16,
}

/// Routing scope an endpoint falls into, used to decide whether a peer's
/// self-reported address should ever be trusted or dialed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingScope {
    Loopback,
    Private,
    Public,
    /// An explicitly allow-listed address outside the normal rules (used
    /// for test networks where private ranges are expected peers).
    Allowed,
}

impl NodeEndpoint {
    pub fn classify(&self, allow_private: bool) -> RoutingScope {
        match self.address {
            IpAddr::V4(v4) => {
                if v4.is_loopback() {
                    RoutingScope::Loopback
                } else if v4.is_private() || v4.is_link_local() {
                    if allow_private {
                        RoutingScope::Allowed
                    } else {
                        RoutingScope::Private
                    }
                } else {
                    RoutingScope::Public
                }
            }
            IpAddr::V6(v6) => {
                if v6.is_loopback() {
                    RoutingScope::Loopback
                } else if allow_private {
                    RoutingScope::Allowed
                } else {
                    RoutingScope::Public
                }
            }
        }
    }

    pub fn is_routable(&self, allow_private: bool) -> bool {
        !matches!(self.classify(allow_private), RoutingScope::Private)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_index_of_identical_ids_is_none() {
        let id = NodeId([7u8; 64]);
        assert_eq!(id.bucket_index(&id), None);
    }

    #[test]
    fn bucket_index_reflects_highest_differing_bit() {
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        a[63] = 0b0000_0001;
        b[63] = 0b0000_0000;
        let id_a = NodeId(a);
        let id_b = NodeId(b);
        assert_eq!(id_a.bucket_index(&id_b), Some(0));
    }

    #[test]
    fn loopback_is_never_public() {
        let ep = NodeEndpoint {
            address: "127.0.0.1".parse().unwrap(),
            udp_port: 30303,
            tcp_port: 30303,
        };
        assert_eq!(ep.classify(false), RoutingScope::Loopback);
    }
}
