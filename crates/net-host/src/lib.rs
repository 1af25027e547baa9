//! The asynchronous runtime driver for the p2p transport: sessions (C14),
//! the capability plug-in contract (§6.5), the host lifecycle (C15), and
//! network-state persistence (§6.6).

pub mod capability;
pub mod host;
pub mod persistence;
pub mod session;

pub use capability::{Capability, CapabilityHost, CapabilityHostError, PeerId};
pub use host::{Host, PeerRecord, PeerType, SlotPolicy};
pub use session::{DisconnectReason, NegotiatedCapability, Session, SessionRegistry};
