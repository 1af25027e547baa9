//! ECIES envelope used to encrypt the handshake's Auth and Ack messages.
//!
//! Layout: `ephemeral_pubkey(65) || iv(16) || ciphertext || mac(32)`, where
//! `mac = HMAC-SHA256(mac_key, iv || ciphertext || shared_mac_data)`. Keys
//! are derived from an ECDH shared secret via the NIST SP 800-56 one-step
//! concatenation KDF.

use aes::cipher::generic_array::GenericArray;
use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use secp256k1::ecdh::SharedSecret;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const PUBKEY_LEN: usize = 65;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const KEY_MATERIAL_LEN: usize = 32; // 16 bytes AES key + 16 bytes MAC key

#[derive(Debug, Error)]
pub enum EciesError {
    #[error("ciphertext shorter than the envelope header")]
    Truncated,
    #[error("mac verification failed")]
    BadMac,
    #[error("invalid public key in envelope")]
    BadPublicKey,
}

fn kdf(shared_secret: &[u8], out_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len);
    let mut counter: u32 = 1;
    while out.len() < out_len {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_secret);
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(out_len);
    out
}

fn shared_secret_x(local_secret: &SecretKey, remote_public: &PublicKey) -> [u8; 32] {
    let point = SharedSecret::new(remote_public, local_secret);
    let mut out = [0u8; 32];
    out.copy_from_slice(point.as_ref());
    out
}

/// Encrypts `message` under `recipient_public`, using a fresh ephemeral
/// key for the ECDH step. `shared_mac_data` is folded into the MAC (empty
/// for the plain handshake, non-empty for some EIP-8 variants).
pub fn encrypt(recipient_public: &PublicKey, message: &[u8], shared_mac_data: &[u8]) -> Result<Vec<u8>, EciesError> {
    let secp = Secp256k1::new();
    let (ephemeral_secret, ephemeral_public) = secp.generate_keypair(&mut rand::thread_rng());

    let shared = shared_secret_x(&ephemeral_secret, recipient_public);
    let key_material = kdf(&shared, KEY_MATERIAL_LEN);
    let (aes_key, mac_key_seed) = key_material.split_at(16);
    let mac_key = Sha256::digest(mac_key_seed);

    let mut iv = [0u8; IV_LEN];
    rand::Rng::fill(&mut rand::thread_rng(), &mut iv);

    let mut ciphertext = message.to_vec();
    let mut cipher = Aes128Ctr::new(GenericArray::from_slice(aes_key), GenericArray::from_slice(&iv));
    cipher.apply_keystream(&mut ciphertext);

    let mut mac = HmacSha256::new_from_slice(&mac_key).expect("hmac accepts any key length");
    mac.update(&iv);
    mac.update(&ciphertext);
    mac.update(shared_mac_data);
    let tag = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(PUBKEY_LEN + IV_LEN + ciphertext.len() + MAC_LEN);
    out.extend_from_slice(&ephemeral_public.serialize_uncompressed());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Decrypts an envelope produced by [`encrypt`] using the recipient's
/// static secret key.
pub fn decrypt(recipient_secret: &SecretKey, envelope: &[u8], shared_mac_data: &[u8]) -> Result<Vec<u8>, EciesError> {
    if envelope.len() < PUBKEY_LEN + IV_LEN + MAC_LEN {
        return Err(EciesError::Truncated);
    }
    let (ephemeral_pub_bytes, rest) = envelope.split_at(PUBKEY_LEN);
    let ephemeral_public = PublicKey::from_slice(ephemeral_pub_bytes).map_err(|_| EciesError::BadPublicKey)?;
    let (iv, rest) = rest.split_at(IV_LEN);
    let (ciphertext, tag) = rest.split_at(rest.len() - MAC_LEN);

    let shared = shared_secret_x(recipient_secret, &ephemeral_public);
    let key_material = kdf(&shared, KEY_MATERIAL_LEN);
    let (aes_key, mac_key_seed) = key_material.split_at(16);
    let mac_key = Sha256::digest(mac_key_seed);

    let mut mac = HmacSha256::new_from_slice(&mac_key).expect("hmac accepts any key length");
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(shared_mac_data);
    mac.verify_slice(tag).map_err(|_| EciesError::BadMac)?;

    let mut plaintext = ciphertext.to_vec();
    let mut cipher = Aes128Ctr::new(GenericArray::from_slice(aes_key), GenericArray::from_slice(iv));
    cipher.apply_keystream(&mut plaintext);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_message() {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
        let message = b"the quick brown fox";
        let envelope = encrypt(&public, message, &[]).unwrap();
        let decrypted = decrypt(&secret, &envelope, &[]).unwrap();
        assert_eq!(decrypted, message);
    }

    #[test]
    fn tampered_ciphertext_fails_mac() {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
        let mut envelope = encrypt(&public, b"payload", &[]).unwrap();
        let mid = envelope.len() / 2;
        envelope[mid] ^= 0xff;
        assert!(matches!(decrypt(&secret, &envelope, &[]), Err(EciesError::BadMac)));
    }
}
