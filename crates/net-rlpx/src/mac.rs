//! The RLPx rolling MAC (§4.11): a Keccak256 running digest whose update
//! rule mixes in an AES-ECB-encrypted copy of its own state.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;
use sha3::{Digest, Keccak256};

pub struct RollingMac {
    hasher: Keccak256,
    ecb: Aes256,
}

impl RollingMac {
    /// `seed` primes the running hash (`mac_secret XOR nonce`); `initial_cipher`
    /// is the first handshake packet's raw bytes, absorbed immediately per
    /// the seeding rule in §4.10.
    pub fn seeded(mac_secret: &[u8; 32], seed: &[u8; 32], initial_cipher: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        let mut primed = [0u8; 32];
        for i in 0..32 {
            primed[i] = mac_secret[i] ^ seed[i];
        }
        hasher.update(primed);
        hasher.update(initial_cipher);
        RollingMac {
            hasher,
            ecb: Aes256::new(GenericArray::from_slice(mac_secret)),
        }
    }

    fn digest(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.hasher.clone().finalize());
        out
    }

    fn encrypt_block(&self, block: &[u8; 16]) -> [u8; 16] {
        let mut buf = GenericArray::clone_from_slice(block);
        self.ecb.encrypt_block(&mut buf);
        let mut out = [0u8; 16];
        out.copy_from_slice(&buf);
        out
    }

    /// Header MAC update: encrypt the digest's first 16 bytes, XOR with
    /// the header ciphertext, absorb, and return the new 16-byte tag.
    pub fn update_header(&mut self, header_ciphertext: &[u8; 16]) -> [u8; 16] {
        let digest = self.digest();
        let mut seed = [0u8; 16];
        seed.copy_from_slice(&digest[..16]);
        let encrypted = self.encrypt_block(&seed);
        let mut mixed = [0u8; 16];
        for i in 0..16 {
            mixed[i] = encrypted[i] ^ header_ciphertext[i];
        }
        self.hasher.update(mixed);
        let new_digest = self.digest();
        let mut tag = [0u8; 16];
        tag.copy_from_slice(&new_digest[..16]);
        tag
    }

    /// Body MAC update: absorb the ciphertext first, then encrypt-and-XOR
    /// the digest against itself.
    pub fn update_body(&mut self, body_ciphertext: &[u8]) -> [u8; 16] {
        self.hasher.update(body_ciphertext);
        let digest = self.digest();
        let mut seed = [0u8; 16];
        seed.copy_from_slice(&digest[..16]);
        let encrypted = self.encrypt_block(&seed);
        let mut mixed = [0u8; 16];
        for i in 0..16 {
            mixed[i] = encrypted[i] ^ digest[i];
        }
        self.hasher.update(mixed);
        let new_digest = self.digest();
        let mut tag = [0u8; 16];
        tag.copy_from_slice(&new_digest[..16]);
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_identical_tags() {
        let secret = [7u8; 32];
        let seed = [3u8; 32];
        let mut a = RollingMac::seeded(&secret, &seed, b"auth-packet");
        let mut b = RollingMac::seeded(&secret, &seed, b"auth-packet");
        assert_eq!(a.update_header(&[1u8; 16]), b.update_header(&[1u8; 16]));
        assert_eq!(a.update_body(b"frame body"), b.update_body(b"frame body"));
    }

    #[test]
    fn different_ciphertext_changes_the_tag() {
        let secret = [7u8; 32];
        let seed = [3u8; 32];
        let mut a = RollingMac::seeded(&secret, &seed, b"auth-packet");
        let mut b = RollingMac::seeded(&secret, &seed, b"auth-packet");
        let tag_a = a.update_header(&[1u8; 16]);
        let tag_b = b.update_header(&[2u8; 16]);
        assert_ne!(tag_a, tag_b);
    }
}
