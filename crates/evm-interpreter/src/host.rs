//! The execution host interface the interpreter consumes as an opaque
//! capability set (§6.1). Deliberately out of this crate's scope: account
//! balances, the storage oracle, and the sub-call dispatcher live on the
//! implementor's side of this trait.

use evm_primitives::{Address, Hash, Word};

use crate::call::{CallFrame, CallResult};

/// Outcome of a `set_storage` call, driving the net-refund machine (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    Unchanged,
    Added,
    Modified,
    Deleted,
    DirtyAddedToDeleted,
    DirtyDeletedReverted,
    DirtyDeletedToAdded,
    DirtyModifiedToDeleted,
    DirtyModifiedReverted,
    DirtyModifiedAgain,
}

/// Transaction/block context snapshot handed to `ORIGIN`/`GASPRICE`/block
/// info opcodes (§6.1 `get_tx_context`).
#[derive(Debug, Clone, Copy)]
pub struct TxContext {
    pub origin: Address,
    pub gas_price: Word,
    pub coinbase: Address,
    pub number: u64,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub difficulty: Word,
    pub chain_id: u64,
}

/// The capability set an interpreter call is run against. All methods are
/// synchronous, called only from within an interpreter step, and never
/// raise an interpreter-side exception — host-side failure is part of the
/// return value (e.g. an absent block hash is simply `Hash::ZERO`).
pub trait Host {
    fn account_exists(&mut self, addr: Address) -> bool;
    fn get_storage(&mut self, addr: Address, key: Word) -> Word;
    fn set_storage(&mut self, addr: Address, key: Word, value: Word) -> StorageStatus;
    fn get_balance(&mut self, addr: Address) -> Word;
    fn get_code_size(&mut self, addr: Address) -> u64;
    fn get_code_hash(&mut self, addr: Address) -> Hash;
    /// Copies up to `len` bytes of `addr`'s code starting at `offset` into
    /// `buf`, zero-padding past the end; returns the number of bytes
    /// actually copied from real code (the rest of `buf` is left as-is by
    /// the caller, which pre-zeros it).
    fn copy_code(&mut self, addr: Address, offset: u64, buf: &mut [u8]) -> u64;
    /// Transfers `self_addr`'s balance to `beneficiary`; returns `true` when
    /// `beneficiary` did not previously exist (and is thus "new", for the
    /// account-creation gas surcharge).
    fn selfdestruct(&mut self, self_addr: Address, beneficiary: Address) -> bool;
    fn emit_log(&mut self, addr: Address, data: Vec<u8>, topics: Vec<Word>);
    fn get_tx_context(&mut self) -> TxContext;
    /// Defined only for the most recent 256 blocks; returns `Hash::ZERO`
    /// otherwise.
    fn get_block_hash(&mut self, number: u64) -> Hash;
    fn call(&mut self, frame: CallFrame) -> CallResult;
}
