//! Shared 256-bit word/address/hash types and the revision table.
//!
//! These types are consumed by both cores of the workspace: the interpreter
//! uses `Word` as its stack slot and `Address`/`Hash` for account and code
//! identity; the p2p core reuses `Hash` for discovery-packet digests.

pub mod arithmetic;
mod revision;
mod status;

pub use revision::Revision;
pub use status::StatusCode;

/// A 256-bit modular integer. All stack slots hold a `Word`.
pub type Word = alloy_primitives::U256;

/// A 160-bit account/contract identifier, derived by truncating a 256-bit hash.
pub type Address = alloy_primitives::Address;

/// A 256-bit Keccak digest, also used for discovery-packet digests.
pub type Hash = alloy_primitives::B256;

/// Converts a `Word` to an `Address` by keeping its low 160 bits, per §3.
pub fn word_to_address(word: &Word) -> Address {
    Address::from_slice(&word.to_be_bytes::<32>()[12..32])
}

/// Converts an `Address` to a `Word`, zero-extending the high bits.
pub fn address_to_word(addr: Address) -> Word {
    let mut buf = [0u8; 32];
    buf[12..32].copy_from_slice(addr.as_slice());
    Word::from_be_bytes(buf)
}
