//! The sub-call and contract-creation state machines (§4.5, §4.6).

use evm_primitives::{Address, Word};

use crate::call::{CallFlags, CallFrame, CallKind};
use crate::host::Host;
use crate::schedule::Schedule;

/// Decoded, not-yet-priced parameters for `CALL`/`CALLCODE`/`DELEGATECALL`/
/// `STATICCALL`, popped from the stack by the opcode handler before the
/// bounce hands off to `run_call`.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub kind: CallKind,
    pub requested_gas: Word,
    pub code_address: Address,
    pub value: Word,
    pub args_offset: usize,
    pub args_size: usize,
    pub ret_offset: usize,
    pub ret_size: usize,
}

/// Decoded parameters for `CREATE`/`CREATE2`.
#[derive(Debug, Clone)]
pub struct PendingCreate {
    pub value: Word,
    pub offset: usize,
    pub size: usize,
    pub salt: Option<Word>,
}

/// Outcome of running the `case_call`/`case_create` bounce: the value the
/// opcode handler pushes on the stack, the caller's updated remaining gas,
/// and the bytes now available through `RETURNDATACOPY`.
pub struct CallOutcome {
    pub pushed: Word,
    pub gas_left_after: i64,
    pub gas_refund_delta: i64,
    pub return_data: Vec<u8>,
    pub created_address: Option<Address>,
}

/// `callee_gas = min(requested, remaining - remaining/64)`, the
/// "all-but-one-64th" rule active from Tangerine Whistle on (§4.5 step 8).
fn cap_forwarded_gas(schedule: &Schedule, requested: u64, remaining: i64) -> u64 {
    match schedule.sub_gas_cap_divisor {
        Some(divisor) => {
            let cap = remaining - remaining / divisor as i64;
            let cap = cap.max(0) as u64;
            requested.min(cap)
        }
        None => {
            if requested > remaining.max(0) as u64 {
                remaining.max(0) as u64
            } else {
                requested
            }
        }
    }
}

/// Executes the full `case_call` state machine (§4.5 steps 2-14), assuming
/// the fixed base cost (step 1) and memory expansion (step 7) were already
/// charged by the caller. Never fails the enclosing frame: balance and
/// depth shortfalls push 0 and refund the callee gas, per steps 10-11.
#[allow(clippy::too_many_arguments)]
pub fn run_call<H: Host>(
    host: &mut H,
    schedule: &Schedule,
    pending: PendingCall,
    caller: Address,
    caller_value: Word,
    caller_sender: Address,
    caller_flags: CallFlags,
    depth: u32,
    remaining_gas: i64,
    input: Vec<u8>,
) -> CallOutcome {
    let static_flag = caller_flags.static_call || pending.kind == CallKind::StaticCall;

    let requested = if pending.requested_gas > Word::from(u64::MAX) {
        u64::MAX
    } else {
        pending.requested_gas.as_limbs()[0]
    };
    let mut callee_gas = cap_forwarded_gas(schedule, requested, remaining_gas);

    // Step 9: a value transfer grants the callee a stipend, free to the
    // caller (not charged against `remaining_gas`).
    let value = match pending.kind {
        CallKind::DelegateCall => caller_value,
        _ => pending.value,
    };
    if value > Word::ZERO {
        callee_gas += schedule.call_stipend;
    }

    // Steps 10-11: insufficient balance or excessive depth -- push 0,
    // refund the callee gas to the caller, do not invoke the host.
    let balance = host.get_balance(caller);
    let insufficient_balance = pending.kind != CallKind::DelegateCall
        && pending.kind != CallKind::StaticCall
        && value > balance;
    if insufficient_balance || depth >= 1024 {
        return CallOutcome {
            pushed: Word::ZERO,
            gas_left_after: remaining_gas,
            gas_refund_delta: 0,
            return_data: Vec::new(),
            created_address: None,
        };
    }

    // DELEGATECALL runs in the caller's own context: the callee must see
    // the caller's own `msg.sender`, not the delegating contract's address.
    let sender = match pending.kind {
        CallKind::DelegateCall => caller_sender,
        _ => caller,
    };

    let frame = CallFrame {
        kind: pending.kind,
        flags: if static_flag {
            CallFlags::STATIC
        } else {
            CallFlags::NONE
        },
        depth: depth + 1,
        gas: callee_gas as i64,
        recipient: match pending.kind {
            CallKind::CallCode | CallKind::DelegateCall => caller,
            _ => pending.code_address,
        },
        sender,
        value,
        input,
        code_hash: host.get_code_hash(pending.code_address),
        salt: None,
    };

    let result = host.call(frame);
    let gas_left_after = remaining_gas - callee_gas as i64 + result.gas_left;
    let pushed = if matches!(result.status, evm_primitives::StatusCode::Success) {
        Word::from(1)
    } else {
        Word::ZERO
    };

    CallOutcome {
        pushed,
        gas_left_after,
        gas_refund_delta: result.gas_refunded,
        return_data: result.output,
        created_address: None,
    }
}

/// `case_create` (§4.6): forwards gas under the same all-but-one-64th rule,
/// pushes the created address on success or zero on failure.
pub fn run_create<H: Host>(
    host: &mut H,
    schedule: &Schedule,
    pending: PendingCreate,
    caller: Address,
    depth: u32,
    remaining_gas: i64,
    init_code: Vec<u8>,
) -> CallOutcome {
    if depth >= 1024 {
        return CallOutcome {
            pushed: Word::ZERO,
            gas_left_after: remaining_gas,
            gas_refund_delta: 0,
            return_data: Vec::new(),
            created_address: None,
        };
    }

    let callee_gas = cap_forwarded_gas(schedule, remaining_gas.max(0) as u64, remaining_gas);

    let kind = if pending.salt.is_some() {
        CallKind::Create2
    } else {
        CallKind::Create
    };

    let frame = CallFrame {
        kind,
        flags: CallFlags::NONE,
        depth: depth + 1,
        gas: callee_gas as i64,
        recipient: Address::ZERO, // assigned by the host on success
        sender: caller,
        value: pending.value,
        input: init_code,
        code_hash: evm_primitives::Hash::ZERO,
        salt: pending.salt,
    };

    let result = host.call(frame);
    let gas_left_after = remaining_gas - callee_gas as i64 + result.gas_left;
    let pushed = result
        .created_address
        .map(word_to_word_from_address)
        .unwrap_or(Word::ZERO);

    CallOutcome {
        pushed,
        gas_left_after,
        gas_refund_delta: result.gas_refunded,
        return_data: result.output,
        created_address: result.created_address,
    }
}

fn word_to_word_from_address(addr: Address) -> Word {
    evm_primitives::address_to_word(addr)
}
