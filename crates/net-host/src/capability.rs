//! The capability plug-in contract (§6.5): higher protocols (eth, les, ...)
//! register against the host without the host knowing anything about
//! their wire format beyond a packet-id range.

use std::time::Duration;

use net_core::NodeId;

use crate::session::DisconnectReason;

pub type PeerId = NodeId;

/// A higher-layer wire protocol multiplexed over a session (§4.12).
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;
    fn version(&self) -> u8;
    /// Number of packet ids this capability occupies starting at the
    /// offset the session assigns it.
    fn message_count(&self) -> u8;
    /// `None` means this capability does no periodic work.
    fn background_work_interval(&self) -> Option<Duration> {
        None
    }

    fn on_connect(&self, peer: PeerId, host: &dyn CapabilityHost);
    /// `packet_id` is already rebased to `[0, message_count)`.
    fn interpret_packet(&self, peer: PeerId, packet_id: u8, payload: &[u8], host: &dyn CapabilityHost);
    fn on_disconnect(&self, peer: PeerId, host: &dyn CapabilityHost);
    fn do_background_work(&self, _host: &dyn CapabilityHost) {}
}

/// The handle a [`Capability`] uses to act back on the host and its
/// peers, without holding a reference to the host's internals directly.
pub trait CapabilityHost: Send + Sync {
    fn disconnect(&self, peer: PeerId, reason: DisconnectReason);
    fn disable_capability(&self, peer: PeerId, name: &'static str);
    fn send_framed(&self, peer: PeerId, packet_id: u8, payload: &[u8]) -> Result<(), CapabilityHostError>;
    fn is_rude(&self, peer: PeerId) -> bool;
    fn set_rude(&self, peer: PeerId, rude: bool);
    fn for_each_peer(&self, f: &mut dyn FnMut(PeerId));
    fn post_work(&self, work: Box<dyn FnOnce() + Send>);
}

#[derive(Debug, thiserror::Error)]
pub enum CapabilityHostError {
    #[error("no session for that peer")]
    NoSuchPeer,
    #[error("capability not negotiated with that peer")]
    CapabilityNotNegotiated,
}
