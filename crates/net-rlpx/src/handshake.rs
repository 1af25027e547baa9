//! The 5-state ECIES handshake (C12, §4.10):
//! `New -> AckAuth | AckAuthEIP8 -> WriteHello -> ReadHello -> StartSession`.
//!
//! This module covers everything up through deriving the frame codec's
//! [`Secrets`]; `WriteHello`/`ReadHello` are plain framed packets handled
//! by the session layer once a [`Secrets`] exists.

use rlp::{Rlp, RlpStream};
use secp256k1::ecdh::SharedSecret;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::ecies;
use crate::mac::RollingMac;

const NONCE_LEN: usize = 32;
const VERSION: u64 = 4;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("ecies envelope: {0}")]
    Ecies(#[from] ecies::EciesError),
    #[error("malformed handshake body: {0}")]
    Rlp(String),
    #[error("embedded signature does not recover a valid public key")]
    BadSignature,
    #[error("handshake message truncated")]
    Truncated,
    #[error("handshake state does not permit this transition")]
    WrongState,
}

impl From<rlp::DecoderError> for HandshakeError {
    fn from(e: rlp::DecoderError) -> Self {
        HandshakeError::Rlp(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    New,
    AckSent,
    AuthSent,
    SecretsDerived,
}

pub struct Handshake {
    initiator: bool,
    state: State,
    static_secret: SecretKey,
    remote_static_public: Option<PublicKey>,
    ephemeral_secret: SecretKey,
    ephemeral_public: PublicKey,
    local_nonce: [u8; NONCE_LEN],
    remote_nonce: Option<[u8; NONCE_LEN]>,
    remote_ephemeral_public: Option<PublicKey>,
    auth_cipher: Option<Vec<u8>>,
    ack_cipher: Option<Vec<u8>>,
}

/// Symmetric state handed off to the frame codec once the handshake
/// completes (§4.10's "derive symmetric state" step).
pub struct Secrets {
    pub aes_secret: [u8; 32],
    pub egress_mac: RollingMac,
    pub ingress_mac: RollingMac,
}

impl Handshake {
    pub fn initiator(static_secret: SecretKey, remote_static_public: PublicKey) -> Self {
        Self::new(true, static_secret, Some(remote_static_public))
    }

    pub fn recipient(static_secret: SecretKey) -> Self {
        Self::new(false, static_secret, None)
    }

    fn new(initiator: bool, static_secret: SecretKey, remote_static_public: Option<PublicKey>) -> Self {
        let secp = Secp256k1::new();
        let (ephemeral_secret, ephemeral_public) = secp.generate_keypair(&mut rand::thread_rng());
        let mut local_nonce = [0u8; NONCE_LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut local_nonce);
        Handshake {
            initiator,
            state: State::New,
            static_secret,
            remote_static_public,
            ephemeral_secret,
            ephemeral_public,
            local_nonce,
            remote_nonce: None,
            remote_ephemeral_public: None,
            auth_cipher: None,
            ack_cipher: None,
        }
    }

    fn static_public(&self) -> PublicKey {
        let secp = Secp256k1::new();
        PublicKey::from_secret_key(&secp, &self.static_secret)
    }

    /// `New (initiator)`: builds and ECIES-encrypts the EIP-8 auth
    /// message. Callers targeting a legacy peer may fall back to
    /// [`Handshake::write_auth_classic`]; EIP-8 is used here as the
    /// default since it is the superset format.
    pub fn write_auth_eip8(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.state != State::New || !self.initiator {
            return Err(HandshakeError::WrongState);
        }
        let remote_static = self.remote_static_public.expect("initiator always has the remote key");
        let static_shared = ecdh_x(&self.static_secret, &remote_static);
        let message = xor32(&static_shared, &self.local_nonce);
        let sig = sign_recoverable(&self.ephemeral_secret, &message);

        let mut body = RlpStream::new_list(4);
        body.append(&sig.to_vec());
        body.append(&self.static_public().serialize_uncompressed()[1..].to_vec());
        body.append(&self.local_nonce.to_vec());
        body.append(&VERSION);
        let padded = pad_eip8(body.out().to_vec());

        let size_prefix = ((padded.len() + 65 + 16 + 32) as u16).to_be_bytes();
        let envelope = ecies::encrypt(&remote_static, &padded, &size_prefix)?;

        let mut packet = Vec::with_capacity(2 + envelope.len());
        packet.extend_from_slice(&size_prefix);
        packet.extend_from_slice(&envelope);

        self.auth_cipher = Some(packet.clone());
        self.state = State::AuthSent;
        Ok(packet)
    }

    /// `New (recipient)`: reads either a fixed-length classic auth or a
    /// size-prefixed EIP-8 auth and recovers the initiator's ephemeral
    /// public key from the embedded signature.
    pub fn read_auth(&mut self, data: &[u8]) -> Result<(), HandshakeError> {
        if self.initiator || self.state != State::New {
            return Err(HandshakeError::WrongState);
        }
        if data.len() < 2 {
            return Err(HandshakeError::Truncated);
        }
        let declared = u16::from_be_bytes([data[0], data[1]]) as usize;

        let (plaintext, remote_static, full_packet) = if declared + 2 == data.len() {
            let envelope = &data[2..];
            let plaintext = ecies::decrypt(&self.static_secret, envelope, &data[..2])?;
            let rlp = Rlp::new(&plaintext);
            let sig_bytes: Vec<u8> = rlp.val_at(0)?;
            let remote_static_bytes: Vec<u8> = rlp.val_at(1)?;
            let nonce_bytes: Vec<u8> = rlp.val_at(2)?;
            let remote_static = decode_public_key(&remote_static_bytes)?;
            (
                (sig_bytes, nonce_bytes),
                remote_static,
                data.to_vec(),
            )
        } else {
            let plaintext = ecies::decrypt(&self.static_secret, data, &[])?;
            if plaintext.len() < 65 + 64 + 32 + 1 {
                return Err(HandshakeError::Truncated);
            }
            let sig_bytes = plaintext[..65].to_vec();
            let remote_static_bytes = plaintext[65..65 + 64].to_vec();
            let nonce_bytes = plaintext[65 + 64..65 + 64 + 32].to_vec();
            let remote_static = decode_public_key(&remote_static_bytes)?;
            ((sig_bytes, nonce_bytes), remote_static, data.to_vec())
        };

        let (sig_bytes, nonce_bytes) = plaintext;
        let mut remote_nonce = [0u8; NONCE_LEN];
        remote_nonce.copy_from_slice(&nonce_bytes);

        let static_shared = ecdh_x(&self.static_secret, &remote_static);
        let message = xor32(&static_shared, &remote_nonce);
        let remote_ephemeral = recover_public(&sig_bytes, &message)?;

        self.remote_static_public = Some(remote_static);
        self.remote_nonce = Some(remote_nonce);
        self.remote_ephemeral_public = Some(remote_ephemeral);
        self.auth_cipher = Some(full_packet);
        Ok(())
    }

    /// `AckAuth` / `AckAuthEIP8`: builds and encrypts the ack reply.
    pub fn write_ack_eip8(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.initiator || self.remote_static_public.is_none() {
            return Err(HandshakeError::WrongState);
        }
        let remote_static = self.remote_static_public.expect("checked above");

        let mut body = RlpStream::new_list(3);
        body.append(&self.ephemeral_public.serialize_uncompressed()[1..].to_vec());
        body.append(&self.local_nonce.to_vec());
        body.append(&VERSION);
        let padded = pad_eip8(body.out().to_vec());

        let size_prefix = ((padded.len() + 65 + 16 + 32) as u16).to_be_bytes();
        let envelope = ecies::encrypt(&remote_static, &padded, &size_prefix)?;

        let mut packet = Vec::with_capacity(2 + envelope.len());
        packet.extend_from_slice(&size_prefix);
        packet.extend_from_slice(&envelope);

        self.ack_cipher = Some(packet.clone());
        self.state = State::AckSent;
        Ok(packet)
    }

    /// Initiator side: reads the recipient's ack and recovers its
    /// ephemeral public key and nonce.
    pub fn read_ack(&mut self, data: &[u8]) -> Result<(), HandshakeError> {
        if !self.initiator || self.state != State::AuthSent {
            return Err(HandshakeError::WrongState);
        }
        if data.len() < 2 {
            return Err(HandshakeError::Truncated);
        }
        let declared = u16::from_be_bytes([data[0], data[1]]) as usize;

        let (ephemeral_bytes, nonce_bytes) = if declared + 2 == data.len() {
            let plaintext = ecies::decrypt(&self.static_secret, &data[2..], &data[..2])?;
            let rlp = Rlp::new(&plaintext);
            let ephemeral_bytes: Vec<u8> = rlp.val_at(0)?;
            let nonce_bytes: Vec<u8> = rlp.val_at(1)?;
            (ephemeral_bytes, nonce_bytes)
        } else {
            let plaintext = ecies::decrypt(&self.static_secret, data, &[])?;
            if plaintext.len() < 64 + 32 + 1 {
                return Err(HandshakeError::Truncated);
            }
            (plaintext[..64].to_vec(), plaintext[64..64 + 32].to_vec())
        };

        let remote_ephemeral = decode_public_key(&ephemeral_bytes)?;
        let mut remote_nonce = [0u8; NONCE_LEN];
        remote_nonce.copy_from_slice(&nonce_bytes);

        self.remote_ephemeral_public = Some(remote_ephemeral);
        self.remote_nonce = Some(remote_nonce);
        self.ack_cipher = Some(data.to_vec());
        Ok(())
    }

    /// Derives the symmetric [`Secrets`] once both sides of the
    /// handshake have exchanged Auth and Ack (§4.10's MAC-seed step).
    pub fn derive_secrets(mut self) -> Result<Secrets, HandshakeError> {
        let remote_ephemeral = self.remote_ephemeral_public.ok_or(HandshakeError::WrongState)?;
        let remote_nonce = self.remote_nonce.ok_or(HandshakeError::WrongState)?;
        let auth_cipher = self.auth_cipher.take().ok_or(HandshakeError::WrongState)?;
        let ack_cipher = self.ack_cipher.take().ok_or(HandshakeError::WrongState)?;

        let ephemeral_shared = ecdh_x(&self.ephemeral_secret, &remote_ephemeral);
        let (initiator_nonce, recipient_nonce) = if self.initiator {
            (self.local_nonce, remote_nonce)
        } else {
            (remote_nonce, self.local_nonce)
        };

        let nonce_hash = keccak(&[&initiator_nonce[..], &recipient_nonce[..]]);
        let shared = keccak(&[&ephemeral_shared[..], &nonce_hash[..]]);
        let aes_secret = keccak(&[&ephemeral_shared[..], &shared[..]]);
        let mac_secret = keccak(&[&ephemeral_shared[..], &aes_secret[..]]);

        let (egress_mac, ingress_mac) = if self.initiator {
            (
                RollingMac::seeded(&mac_secret, &recipient_nonce, &auth_cipher),
                RollingMac::seeded(&mac_secret, &initiator_nonce, &ack_cipher),
            )
        } else {
            (
                RollingMac::seeded(&mac_secret, &initiator_nonce, &ack_cipher),
                RollingMac::seeded(&mac_secret, &recipient_nonce, &auth_cipher),
            )
        };

        self.state = State::SecretsDerived;
        Ok(Secrets {
            aes_secret,
            egress_mac,
            ingress_mac,
        })
    }

    pub fn remote_static_public(&self) -> Option<PublicKey> {
        self.remote_static_public
    }

    pub fn state(&self) -> State {
        self.state
    }
}

fn ecdh_x(secret: &SecretKey, public: &PublicKey) -> [u8; 32] {
    let point = SharedSecret::new(public, secret);
    let mut out = [0u8; 32];
    out.copy_from_slice(point.as_ref());
    out
}

fn xor32(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = a[i] ^ b[i];
    }
    out
}

fn keccak(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn sign_recoverable(secret: &SecretKey, message: &[u8; 32]) -> [u8; 65] {
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest_slice(message).expect("32-byte message");
    let (recovery_id, sig) = secp.sign_ecdsa_recoverable(&msg, secret).serialize_compact();
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&sig);
    out[64] = recovery_id.to_i32() as u8;
    out
}

fn recover_public(sig_bytes: &[u8], message: &[u8; 32]) -> Result<PublicKey, HandshakeError> {
    if sig_bytes.len() != 65 {
        return Err(HandshakeError::BadSignature);
    }
    let recovery_id = RecoveryId::from_i32(sig_bytes[64] as i32).map_err(|_| HandshakeError::BadSignature)?;
    let sig = RecoverableSignature::from_compact(&sig_bytes[..64], recovery_id).map_err(|_| HandshakeError::BadSignature)?;
    let msg = Message::from_digest_slice(message).map_err(|_| HandshakeError::BadSignature)?;
    let secp = Secp256k1::verification_only();
    secp.recover_ecdsa(&msg, &sig).map_err(|_| HandshakeError::BadSignature)
}

fn decode_public_key(bytes: &[u8]) -> Result<PublicKey, HandshakeError> {
    if bytes.len() != 64 {
        return Err(HandshakeError::BadSignature);
    }
    let mut uncompressed = [0u8; 65];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(bytes);
    PublicKey::from_slice(&uncompressed).map_err(|_| HandshakeError::BadSignature)
}

fn pad_eip8(mut body: Vec<u8>) -> Vec<u8> {
    let mut padding = vec![0u8; 100 + (body.len() % 41)];
    rand::Rng::fill(&mut rand::thread_rng(), padding.as_mut_slice());
    body.extend_from_slice(&padding);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiator_and_recipient_derive_matching_secrets() {
        let secp = Secp256k1::new();
        let (initiator_secret, initiator_public) = secp.generate_keypair(&mut rand::thread_rng());
        let (recipient_secret, recipient_public) = secp.generate_keypair(&mut rand::thread_rng());

        let mut initiator = Handshake::initiator(initiator_secret, recipient_public);
        let mut recipient = Handshake::recipient(recipient_secret);

        let auth = initiator.write_auth_eip8().unwrap();
        recipient.read_auth(&auth).unwrap();
        assert_eq!(recipient.remote_static_public(), Some(initiator_public));

        let ack = recipient.write_ack_eip8().unwrap();
        initiator.read_ack(&ack).unwrap();

        let initiator_secrets = initiator.derive_secrets().unwrap();
        let recipient_secrets = recipient.derive_secrets().unwrap();
        assert_eq!(initiator_secrets.aes_secret, recipient_secrets.aes_secret);
    }
}
