//! Call-frame input/output types shared across the interpreter entry point
//! and the sub-call trampoline (§3, §4.5, §4.6).

use evm_primitives::{Address, Hash, StatusCode, Word};

/// Which of the six ways a message call or contract creation was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

/// Call-frame flags. `STATIC` forbids state mutation for the whole subtree
/// rooted at this frame (§4.5 step 3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallFlags {
    pub static_call: bool,
}

impl CallFlags {
    pub const NONE: CallFlags = CallFlags { static_call: false };
    pub const STATIC: CallFlags = CallFlags { static_call: true };
}

/// Interpreter entry input (§3 "Call frame").
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub kind: CallKind,
    pub flags: CallFlags,
    pub depth: u32,
    pub gas: i64,
    pub recipient: Address,
    pub sender: Address,
    pub value: Word,
    pub input: Vec<u8>,
    pub code_hash: Hash,
    pub salt: Option<Word>,
}

/// Interpreter entry output (§3 "Call result").
#[derive(Debug, Clone)]
pub struct CallResult {
    pub status: StatusCode,
    pub gas_left: i64,
    pub gas_refunded: i64,
    pub output: Vec<u8>,
    pub created_address: Option<Address>,
}

impl CallResult {
    pub fn failure(status: StatusCode) -> CallResult {
        CallResult {
            status,
            gas_left: 0,
            gas_refunded: 0,
            output: Vec::new(),
            created_address: None,
        }
    }
}
