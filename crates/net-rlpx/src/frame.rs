//! The RLPx frame codec (C13, §4.11): encrypted header, encrypted padded
//! body, MAC over each, using the symmetric state a completed
//! [`crate::handshake::Handshake`] produces.

use aes::cipher::generic_array::GenericArray;
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rlp::{Rlp, RlpStream};
use thiserror::Error;

use crate::handshake::Secrets;
use crate::mac::RollingMac;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

const HEADER_LEN: usize = 16;
const MAC_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated before header/body MAC")]
    Truncated,
    #[error("header MAC does not match")]
    BadHeaderMac,
    #[error("body MAC does not match")]
    BadBodyMac,
    #[error("malformed frame header: {0}")]
    BadHeader(String),
}

impl From<rlp::DecoderError> for FrameError {
    fn from(e: rlp::DecoderError) -> Self {
        FrameError::BadHeader(e.to_string())
    }
}

/// A decoded frame header (§4.11): body length, protocol id, and (for a
/// multi-frame packet's first frame) the declared total payload length.
/// Only single-frame packets are produced by [`FrameCodec::write_frame`];
/// `total_frame_size` is still decoded for interoperability with a peer
/// that sends multi-frame packets, even though nothing here reassembles
/// them.
pub struct FrameHeader {
    pub body_len: usize,
    pub protocol_id: u16,
    pub total_frame_size: Option<u32>,
}

pub struct FrameCodec {
    egress_cipher: Aes256Ctr,
    ingress_cipher: Aes256Ctr,
    egress_mac: RollingMac,
    ingress_mac: RollingMac,
}

impl FrameCodec {
    pub fn new(secrets: Secrets) -> Self {
        let zero_iv = [0u8; 16];
        FrameCodec {
            egress_cipher: Aes256Ctr::new(GenericArray::from_slice(&secrets.aes_secret), GenericArray::from_slice(&zero_iv)),
            ingress_cipher: Aes256Ctr::new(GenericArray::from_slice(&secrets.aes_secret), GenericArray::from_slice(&zero_iv)),
            egress_mac: secrets.egress_mac,
            ingress_mac: secrets.ingress_mac,
        }
    }

    /// Writes `payload` as a single-frame packet (header `[protocol-id, 0]`
    /// per §4.11's single-frame convention).
    pub fn write_frame(&mut self, protocol_id: u16, payload: &[u8]) -> Vec<u8> {
        let mut header_rlp = RlpStream::new_list(2);
        header_rlp.append(&protocol_id);
        header_rlp.append(&0u32);
        let header_rlp_bytes = header_rlp.out();

        let mut header_plain = [0u8; HEADER_LEN];
        let len = payload.len() as u32;
        header_plain[0] = (len >> 16) as u8;
        header_plain[1] = (len >> 8) as u8;
        header_plain[2] = len as u8;
        header_plain[3..3 + header_rlp_bytes.len()].copy_from_slice(&header_rlp_bytes);

        let mut header_cipher = header_plain;
        self.egress_cipher.apply_keystream(&mut header_cipher);
        let header_mac = self.egress_mac.update_header(&header_cipher);

        let mut body_padded = payload.to_vec();
        let pad = (16 - body_padded.len() % 16) % 16;
        body_padded.extend(std::iter::repeat(0u8).take(pad));
        self.egress_cipher.apply_keystream(&mut body_padded);
        let body_mac = self.egress_mac.update_body(&body_padded);

        let mut out = Vec::with_capacity(HEADER_LEN + MAC_LEN + body_padded.len() + MAC_LEN);
        out.extend_from_slice(&header_cipher);
        out.extend_from_slice(&header_mac);
        out.extend_from_slice(&body_padded);
        out.extend_from_slice(&body_mac);
        out
    }

    /// Reads one frame's header off the wire, verifying its MAC and
    /// decrypting it. `input` must be exactly 32 bytes
    /// (`header_cipher || header_mac`).
    pub fn read_header(&mut self, input: &[u8]) -> Result<FrameHeader, FrameError> {
        if input.len() != HEADER_LEN + MAC_LEN {
            return Err(FrameError::Truncated);
        }
        let (header_cipher, claimed_mac) = input.split_at(HEADER_LEN);
        let mut header_cipher_arr = [0u8; HEADER_LEN];
        header_cipher_arr.copy_from_slice(header_cipher);

        let expected_mac = self.ingress_mac.update_header(&header_cipher_arr);
        if expected_mac != claimed_mac {
            return Err(FrameError::BadHeaderMac);
        }

        let mut header_plain = header_cipher_arr;
        self.ingress_cipher.apply_keystream(&mut header_plain);

        let body_len = ((header_plain[0] as usize) << 16) | ((header_plain[1] as usize) << 8) | header_plain[2] as usize;
        let rlp = Rlp::new(&header_plain[3..]);
        let protocol_id: u16 = rlp.val_at(0)?;
        let total_frame_size: Option<u32> = rlp.val_at(1).ok().filter(|len| *len != 0);

        Ok(FrameHeader {
            body_len,
            protocol_id,
            total_frame_size,
        })
    }

    /// Reads the body following a header read via [`FrameCodec::read_header`].
    /// `input` is `body_cipher_padded || body_mac`.
    pub fn read_body(&mut self, input: &[u8], body_len: usize) -> Result<Vec<u8>, FrameError> {
        if input.len() < MAC_LEN {
            return Err(FrameError::Truncated);
        }
        let (body_cipher, claimed_mac) = input.split_at(input.len() - MAC_LEN);
        let expected_mac = self.ingress_mac.update_body(body_cipher);
        if expected_mac != claimed_mac {
            return Err(FrameError::BadBodyMac);
        }
        let mut body_plain = body_cipher.to_vec();
        self.ingress_cipher.apply_keystream(&mut body_plain);
        body_plain.truncate(body_len);
        Ok(body_plain)
    }

    /// Total on-wire length of the header section for a frame (used by
    /// callers driving the socket read loop: read this many bytes, call
    /// [`FrameCodec::read_header`], then read `padded_body_len(header.body_len) + 16`
    /// more and call [`FrameCodec::read_body`]).
    pub const HEADER_SECTION_LEN: usize = HEADER_LEN + MAC_LEN;

    pub fn padded_body_len(body_len: usize) -> usize {
        let pad = (16 - body_len % 16) % 16;
        body_len + pad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::Handshake;
    use secp256k1::Secp256k1;

    fn paired_codecs() -> (FrameCodec, FrameCodec) {
        let secp = Secp256k1::new();
        let (initiator_secret, _) = secp.generate_keypair(&mut rand::thread_rng());
        let (recipient_secret, recipient_public) = secp.generate_keypair(&mut rand::thread_rng());

        let mut initiator = Handshake::initiator(initiator_secret, recipient_public);
        let mut recipient = Handshake::recipient(recipient_secret);

        let auth = initiator.write_auth_eip8().unwrap();
        recipient.read_auth(&auth).unwrap();
        let ack = recipient.write_ack_eip8().unwrap();
        initiator.read_ack(&ack).unwrap();

        let initiator_secrets = initiator.derive_secrets().unwrap();
        let recipient_secrets = recipient.derive_secrets().unwrap();
        (FrameCodec::new(initiator_secrets), FrameCodec::new(recipient_secrets))
    }

    #[test]
    fn a_frame_written_by_one_side_reads_back_on_the_other() {
        let (mut sender, mut receiver) = paired_codecs();
        let payload = b"hello capability layer".to_vec();
        let wire = sender.write_frame(0, &payload);

        let header = receiver.read_header(&wire[..FrameCodec::HEADER_SECTION_LEN]).unwrap();
        assert_eq!(header.protocol_id, 0);
        let body_section = &wire[FrameCodec::HEADER_SECTION_LEN..];
        let decoded = receiver.read_body(body_section, header.body_len).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn a_flipped_body_bit_fails_the_body_mac() {
        let (mut sender, mut receiver) = paired_codecs();
        let mut wire = sender.write_frame(0, b"payload");
        let last = wire.len() - 1;
        wire[last] ^= 0x01;

        let header = receiver.read_header(&wire[..FrameCodec::HEADER_SECTION_LEN]).unwrap();
        let body_section = &wire[FrameCodec::HEADER_SECTION_LEN..];
        assert_eq!(receiver.read_body(body_section, header.body_len), Err(FrameError::BadBodyMac));
    }
}
