//! RLPx transport security: the ECIES handshake (C12) and the MAC-framed
//! transport codec (C13) built on the secrets it derives.

pub mod ecies;
pub mod frame;
pub mod handshake;
pub mod mac;

pub use frame::{FrameCodec, FrameError, FrameHeader};
pub use handshake::{Handshake, HandshakeError, Secrets, State as HandshakeState};
