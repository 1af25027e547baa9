//! A gas-metered interpreter for the 256-bit stack machine: cost schedule
//! (C2), opcode metadata (C3), execution memory (C4), the value stack (C5),
//! one-time bytecode preprocessing (C6), the dispatch loop (C7), and the
//! net-storage-change refund machine (C8).
//!
//! The interpreter is parameterized entirely by the [`Host`] trait; it owns
//! no account state, no chain configuration beyond the [`schedule::Schedule`]
//! it is handed, and performs no I/O of its own.

pub mod call;
pub mod code;
pub mod host;
pub mod interpreter;
pub mod memory;
pub mod opcode;
pub mod ops;
pub mod schedule;
pub mod stack;
pub mod step;
pub mod storage_gas;

pub use call::{CallFlags, CallFrame, CallKind, CallResult};
pub use code::Code;
pub use host::{Host, StorageStatus, TxContext};
pub use schedule::Schedule;

use evm_primitives::Revision;

/// Runs one call frame to completion (§6.2). `code` should already be the
/// preprocessed form of the bytecode at `frame.recipient` (or the init code
/// at `frame.sender` for a creation), built once via [`Code::new`] and
/// reused across calls into the same contract.
pub fn execute<H: Host>(host: &mut H, revision: Revision, frame: CallFrame, code: &Code) -> CallResult {
    let schedule = Schedule::for_revision(revision);
    interpreter::run(host, revision, &schedule, frame, code)
}
