//! Per-step control-flow signal an opcode handler hands back to the main
//! loop (§4.2's trampoline redesign: handlers return data, never unwind).

use evm_primitives::StatusCode;

#[derive(Debug)]
pub enum Step {
    /// Advance `pc` by the opcode's own width and keep going.
    Continue,
    /// Set `pc` to this absolute offset (already validated) and keep going.
    Jump(usize),
    Stop,
    Return(Vec<u8>),
    Revert(Vec<u8>),
    SelfDestruct,
    /// Abort the frame with this status; all remaining gas is burned unless
    /// `status.retains_gas()`.
    Trap(StatusCode),
}
