//! Environment- and block-information opcodes (§4.2 tiers `Base`/`Low` plus
//! the `Special`-tier copy opcodes).

use evm_primitives::{address_to_word, Hash, Word};

use crate::call::CallFrame;
use crate::host::{Host, TxContext};
use crate::memory::Memory;
use crate::stack::Stack;

pub fn address(frame: &CallFrame, stack: &mut Stack) {
    stack.push(address_to_word(frame.recipient));
}

pub fn balance<H: Host>(host: &mut H, stack: &mut Stack) {
    let addr_word = stack.pop();
    let addr = evm_primitives::word_to_address(&addr_word);
    stack.push(host.get_balance(addr));
}

pub fn origin(tx: &TxContext, stack: &mut Stack) {
    stack.push(address_to_word(tx.origin));
}

pub fn caller(frame: &CallFrame, stack: &mut Stack) {
    stack.push(address_to_word(frame.sender));
}

pub fn callvalue(frame: &CallFrame, stack: &mut Stack) {
    stack.push(frame.value);
}

pub fn calldataload(frame: &CallFrame, stack: &mut Stack) {
    let offset = stack.pop();
    let offset = if offset > Word::from(usize::MAX) {
        usize::MAX
    } else {
        offset.as_limbs()[0] as usize
    };
    let mut bytes = [0u8; 32];
    for (i, slot) in bytes.iter_mut().enumerate() {
        *slot = offset
            .checked_add(i)
            .and_then(|idx| frame.input.get(idx))
            .copied()
            .unwrap_or(0);
    }
    stack.push(Word::from_be_bytes(bytes));
}

pub fn calldatasize(frame: &CallFrame, stack: &mut Stack) {
    stack.push(Word::from(frame.input.len() as u64));
}

pub fn calldatacopy(frame: &CallFrame, memory: &mut Memory, stack: &mut Stack) {
    let dest = stack.pop().as_limbs()[0] as usize;
    let src = stack.pop().as_limbs()[0] as usize;
    let len = stack.pop().as_limbs()[0] as usize;
    memory.copy_from_padded(dest, &frame.input, src, len);
}

pub fn codesize(code_len: usize, stack: &mut Stack) {
    stack.push(Word::from(code_len as u64));
}

pub fn codecopy(code: &[u8], memory: &mut Memory, stack: &mut Stack) {
    let dest = stack.pop().as_limbs()[0] as usize;
    let src = stack.pop().as_limbs()[0] as usize;
    let len = stack.pop().as_limbs()[0] as usize;
    memory.copy_from_padded(dest, code, src, len);
}

pub fn gasprice(tx: &TxContext, stack: &mut Stack) {
    stack.push(tx.gas_price);
}

pub fn extcodesize<H: Host>(host: &mut H, stack: &mut Stack) {
    let addr_word = stack.pop();
    let addr = evm_primitives::word_to_address(&addr_word);
    stack.push(Word::from(host.get_code_size(addr)));
}

pub fn extcodecopy<H: Host>(host: &mut H, memory: &mut Memory, stack: &mut Stack) {
    let addr_word = stack.pop();
    let addr = evm_primitives::word_to_address(&addr_word);
    let dest = stack.pop().as_limbs()[0] as usize;
    let src_offset = stack.pop().as_limbs()[0] as u64;
    let len = stack.pop().as_limbs()[0] as usize;
    let mut buf = vec![0u8; len];
    host.copy_code(addr, src_offset, &mut buf);
    memory.set_slice(dest, &buf);
}

pub fn returndatasize(return_data: &[u8], stack: &mut Stack) {
    stack.push(Word::from(return_data.len() as u64));
}

pub fn returndatacopy(return_data: &[u8], memory: &mut Memory, stack: &mut Stack) -> Option<()> {
    let dest = stack.pop().as_limbs()[0] as usize;
    let src = stack.pop().as_limbs()[0] as usize;
    let len = stack.pop().as_limbs()[0] as usize;
    if src.checked_add(len)? > return_data.len() {
        return None;
    }
    memory.copy_from_padded(dest, return_data, src, len);
    Some(())
}

pub fn extcodehash<H: Host>(host: &mut H, stack: &mut Stack) {
    let addr_word = stack.pop();
    let addr = evm_primitives::word_to_address(&addr_word);
    let exists = host.account_exists(addr);
    let hash = if exists {
        host.get_code_hash(addr)
    } else {
        Hash::ZERO
    };
    stack.push(Word::from_be_bytes(hash.0));
}

pub fn blockhash<H: Host>(host: &mut H, stack: &mut Stack) {
    let number = stack.pop();
    let number = if number > Word::from(u64::MAX) {
        u64::MAX
    } else {
        number.as_limbs()[0]
    };
    let hash = host.get_block_hash(number);
    stack.push(Word::from_be_bytes(hash.0));
}

pub fn coinbase(tx: &TxContext, stack: &mut Stack) {
    stack.push(address_to_word(tx.coinbase));
}

pub fn timestamp(tx: &TxContext, stack: &mut Stack) {
    stack.push(Word::from(tx.timestamp));
}

pub fn number(tx: &TxContext, stack: &mut Stack) {
    stack.push(Word::from(tx.number));
}

pub fn difficulty(tx: &TxContext, stack: &mut Stack) {
    stack.push(tx.difficulty);
}

pub fn gaslimit(tx: &TxContext, stack: &mut Stack) {
    stack.push(Word::from(tx.gas_limit));
}

pub fn chainid(tx: &TxContext, stack: &mut Stack) {
    stack.push(Word::from(tx.chain_id));
}

pub fn selfbalance<H: Host>(host: &mut H, frame: &CallFrame, stack: &mut Stack) {
    stack.push(host.get_balance(frame.recipient));
}

pub fn gas(remaining: i64, stack: &mut Stack) {
    stack.push(Word::from(remaining.max(0) as u64));
}

pub fn pc(pc: usize, stack: &mut Stack) {
    stack.push(Word::from(pc as u64));
}
