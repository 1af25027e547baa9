//! Node identity, the discovery wire format, and the Kademlia routing
//! table shared by the p2p transport: C9 (endpoints), C10 (datagrams),
//! and C11 (node table).
//!
//! This crate is deliberately synchronous; the event loop that drives UDP
//! sockets and timers lives in `net-host`.

pub mod datagram;
pub mod endpoint;
pub mod node_table;

pub use datagram::{DatagramError, FindNode, Neighbour, Neighbours, Packet, Ping, Pong};
pub use endpoint::{NodeEndpoint, NodeId, RoutingScope};
pub use node_table::{Lookup, NodeEntry, NodeTable, NoteActiveOutcome};
