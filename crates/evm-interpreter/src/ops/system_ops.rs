//! `KECCAK256`, `LOG*`, the terminal opcodes, and decoding the six call/create
//! variants into the plain structs `call_ops` consumes (§4.2, §4.5, §4.6).

use sha3::{Digest, Keccak256};

use evm_primitives::{Address, Word};

use crate::call::CallKind;
use crate::memory::Memory;
use crate::ops::call_ops::{PendingCall, PendingCreate};
use crate::opcode::op;
use crate::stack::Stack;
use crate::step::Step;

pub fn keccak256(memory: &Memory, stack: &mut Stack) {
    let offset = stack.pop().as_limbs()[0] as usize;
    let len = stack.pop().as_limbs()[0] as usize;
    let digest = Keccak256::digest(memory.get_slice(offset, len));
    stack.push(Word::from_be_bytes(<[u8; 32]>::from(digest)));
}

pub fn log(memory: &Memory, stack: &mut Stack, topic_count: usize) -> (Vec<u8>, Vec<Word>) {
    let offset = stack.pop().as_limbs()[0] as usize;
    let len = stack.pop().as_limbs()[0] as usize;
    let topics = (0..topic_count).map(|_| stack.pop()).collect();
    (memory.get_slice(offset, len).to_vec(), topics)
}

pub fn ret(memory: &Memory, stack: &mut Stack) -> Step {
    let offset = stack.pop().as_limbs()[0] as usize;
    let len = stack.pop().as_limbs()[0] as usize;
    Step::Return(memory.get_slice(offset, len).to_vec())
}

pub fn revert(memory: &Memory, stack: &mut Stack) -> Step {
    let offset = stack.pop().as_limbs()[0] as usize;
    let len = stack.pop().as_limbs()[0] as usize;
    Step::Revert(memory.get_slice(offset, len).to_vec())
}

pub fn selfdestruct_beneficiary(stack: &mut Stack) -> Address {
    let word = stack.pop();
    evm_primitives::word_to_address(&word)
}

pub fn decode_create(stack: &mut Stack, memory: &Memory, opcode: u8) -> (PendingCreate, Vec<u8>) {
    let value = stack.pop();
    let offset = stack.pop().as_limbs()[0] as usize;
    let size = stack.pop().as_limbs()[0] as usize;
    let salt = if opcode == op::CREATE2 {
        Some(stack.pop())
    } else {
        None
    };
    let init_code = memory.get_slice(offset, size).to_vec();
    (
        PendingCreate {
            value,
            offset,
            size,
            salt,
        },
        init_code,
    )
}

/// Decodes one of `CALL`/`CALLCODE`/`DELEGATECALL`/`STATICCALL`. The three
/// post-Homestead variants omit `value` from the stack (`DELEGATECALL`
/// inherits the caller's; `STATICCALL` is always value-free), per §4.5.
pub fn decode_call(stack: &mut Stack, memory: &Memory, opcode: u8) -> (PendingCall, Vec<u8>) {
    let kind = match opcode {
        op::CALL => CallKind::Call,
        op::CALLCODE => CallKind::CallCode,
        op::DELEGATECALL => CallKind::DelegateCall,
        op::STATICCALL => CallKind::StaticCall,
        _ => unreachable!("decode_call invoked with a non-call opcode"),
    };
    let requested_gas = stack.pop();
    let code_addr_word = stack.pop();
    let code_address = evm_primitives::word_to_address(&code_addr_word);
    let value = match kind {
        CallKind::Call | CallKind::CallCode => stack.pop(),
        CallKind::DelegateCall | CallKind::StaticCall => Word::ZERO,
        _ => unreachable!(),
    };
    let args_offset = stack.pop().as_limbs()[0] as usize;
    let args_size = stack.pop().as_limbs()[0] as usize;
    let ret_offset = stack.pop().as_limbs()[0] as usize;
    let ret_size = stack.pop().as_limbs()[0] as usize;
    let input = memory.get_slice(args_offset, args_size).to_vec();
    (
        PendingCall {
            kind,
            requested_gas,
            code_address,
            value,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        },
        input,
    )
}
