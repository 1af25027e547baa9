//! The dispatch loop (C7): one call frame, one code object, one gas meter.
//!
//! Each iteration looks up static opcode metadata, checks stack depth,
//! charges gas (§4.2 steps 1-7 in order), then hands off to the opcode's
//! handler. Handlers never unwind; they report what happened through
//! [`Step`], and a `CALL`/`CREATE` variant's sub-frame is run by recursing
//! through [`Host::call`] rather than through a separate bounce channel --
//! the host is itself expected to dispatch back into this crate for calls
//! to EVM-hosted code, so the recursion already crosses the one boundary
//! `spec.md` draws around the host.

use evm_primitives::{Revision, StatusCode, Word};

use crate::call::{CallFrame, CallResult};
use crate::code::Code;
use crate::host::Host;
use crate::memory::Memory;
use crate::opcode::{op, opcode_info_for_revision, tier_index};
use crate::ops::{arithmetic_ops, bitwise_ops, call_ops, control_ops, environment_ops, memory_ops, storage_ops, system_ops};
use crate::schedule::Schedule;
use crate::stack::{Stack, STACK_LIMIT};
use crate::step::Step;

/// Whether `opcode` mutates state and must therefore be rejected in a
/// static (§4.5 step 3 / EIP-214) frame.
fn is_state_mutating(opcode: u8, value_transfer: bool) -> bool {
    matches!(
        opcode,
        op::SSTORE | op::CREATE | op::CREATE2 | op::SELFDESTRUCT
    ) || matches!(opcode, op::CALL) && value_transfer
        || op::is_log(opcode)
}

/// Runs `frame`'s `code` to completion against `host`, metering gas per
/// `schedule`, and returns the call's outcome (§6.2).
pub fn run<H: Host>(host: &mut H, revision: Revision, schedule: &Schedule, frame: CallFrame, code: &Code) -> CallResult {
    let mut stack = Stack::new();
    let mut memory = Memory::new();
    let mut pc: usize = 0;
    let mut gas_left: i64 = frame.gas;
    let mut gas_refund: i64 = 0;
    let mut return_data: Vec<u8> = Vec::new();
    let tx = host.get_tx_context();

    loop {
        let opcode = code.byte_at(pc);

        if op::is_internal(opcode) && !code.is_legitimate_internal_opcode(pc) {
            return finish(StatusCode::InvalidInstruction, gas_left, gas_refund, Vec::new(), None);
        }

        let info = match opcode_info_for_revision(opcode, revision) {
            Some(info) => info,
            None => return finish(StatusCode::UndefinedInstruction, gas_left, gas_refund, Vec::new(), None),
        };

        if stack.len() < info.stack_in as usize {
            return finish(StatusCode::StackUnderflow, gas_left, gas_refund, Vec::new(), None);
        }
        let stack_after = stack.len() as i64 + info.stack_delta as i64;
        if stack_after > STACK_LIMIT as i64 {
            return finish(StatusCode::StackOverflow, gas_left, gas_refund, Vec::new(), None);
        }

        let value_transfer_call = opcode == op::CALL && stack.len() >= 3 && !stack.peek(2).is_zero();
        if frame.flags.static_call && is_state_mutating(opcode, value_transfer_call) {
            return finish(StatusCode::StaticModeViolation, gas_left, gas_refund, Vec::new(), None);
        }

        if let Some(tier) = tier_index(info.tier) {
            gas_left -= schedule.tier_step_gas[tier] as i64;
        }
        if gas_left < 0 {
            return finish(StatusCode::OutOfGas, 0, gas_refund, Vec::new(), None);
        }

        let step = match opcode {
            op::STOP => Step::Stop,

            op::ADD => { arithmetic_ops::add(&mut stack); Step::Continue }
            op::MUL => { arithmetic_ops::mul(&mut stack); Step::Continue }
            op::SUB => { arithmetic_ops::sub(&mut stack); Step::Continue }
            op::DIV => { arithmetic_ops::div(&mut stack); Step::Continue }
            op::SDIV => { arithmetic_ops::sdiv(&mut stack); Step::Continue }
            op::MOD => { arithmetic_ops::rem(&mut stack); Step::Continue }
            op::SMOD => { arithmetic_ops::smod(&mut stack); Step::Continue }
            op::ADDMOD => { arithmetic_ops::addmod(&mut stack); Step::Continue }
            op::MULMOD => { arithmetic_ops::mulmod(&mut stack); Step::Continue }
            op::EXP => {
                let exponent = stack.peek(1);
                let surcharge = arithmetic_ops::exp_gas_surcharge(schedule.exp_byte_gas, exponent);
                gas_left -= (schedule.exp_gas + surcharge) as i64;
                arithmetic_ops::exp(&mut stack);
                Step::Continue
            }
            op::SIGNEXTEND => { arithmetic_ops::signextend(&mut stack); Step::Continue }

            op::LT => { bitwise_ops::lt(&mut stack); Step::Continue }
            op::GT => { bitwise_ops::gt(&mut stack); Step::Continue }
            op::SLT => { bitwise_ops::slt(&mut stack); Step::Continue }
            op::SGT => { bitwise_ops::sgt(&mut stack); Step::Continue }
            op::EQ => { bitwise_ops::eq(&mut stack); Step::Continue }
            op::ISZERO => { bitwise_ops::iszero(&mut stack); Step::Continue }
            op::AND => { bitwise_ops::and(&mut stack); Step::Continue }
            op::OR => { bitwise_ops::or(&mut stack); Step::Continue }
            op::XOR => { bitwise_ops::xor(&mut stack); Step::Continue }
            op::NOT => { bitwise_ops::not(&mut stack); Step::Continue }
            op::BYTE => { bitwise_ops::byte(&mut stack); Step::Continue }
            op::SHL => { bitwise_ops::shl(&mut stack); Step::Continue }
            op::SHR => { bitwise_ops::shr(&mut stack); Step::Continue }
            op::SAR => { bitwise_ops::sar(&mut stack); Step::Continue }

            op::KECCAK256 => {
                let offset = stack.peek(0).as_limbs()[0];
                let len = stack.peek(1).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, offset, len);
                let words = len.div_ceil(32);
                gas_left -= (schedule.sha3_gas + schedule.sha3_word_gas * words + mem_cost) as i64;
                memory.resize(new_len);
                system_ops::keccak256(&memory, &mut stack);
                Step::Continue
            }

            op::ADDRESS => { environment_ops::address(&frame, &mut stack); Step::Continue }
            op::BALANCE => { gas_left -= schedule.balance_gas as i64; environment_ops::balance(host, &mut stack); Step::Continue }
            op::ORIGIN => { environment_ops::origin(&tx, &mut stack); Step::Continue }
            op::CALLER => { environment_ops::caller(&frame, &mut stack); Step::Continue }
            op::CALLVALUE => { environment_ops::callvalue(&frame, &mut stack); Step::Continue }
            op::CALLDATALOAD => { environment_ops::calldataload(&frame, &mut stack); Step::Continue }
            op::CALLDATASIZE => { environment_ops::calldatasize(&frame, &mut stack); Step::Continue }
            op::CALLDATACOPY => {
                let dest = stack.peek(0).as_limbs()[0];
                let len = stack.peek(2).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, dest, len);
                gas_left -= (schedule.copy_gas * len.div_ceil(32) + mem_cost) as i64;
                memory.resize(new_len);
                environment_ops::calldatacopy(&frame, &mut memory, &mut stack);
                Step::Continue
            }
            op::CODESIZE => { environment_ops::codesize(code.len(), &mut stack); Step::Continue }
            op::CODECOPY => {
                let dest = stack.peek(0).as_limbs()[0];
                let len = stack.peek(2).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, dest, len);
                gas_left -= (schedule.copy_gas * len.div_ceil(32) + mem_cost) as i64;
                memory.resize(new_len);
                environment_ops::codecopy(code.original_bytes(), &mut memory, &mut stack);
                Step::Continue
            }
            op::GASPRICE => { environment_ops::gasprice(&tx, &mut stack); Step::Continue }
            op::EXTCODESIZE => { gas_left -= schedule.extcodesize_gas as i64; environment_ops::extcodesize(host, &mut stack); Step::Continue }
            op::EXTCODECOPY => {
                let dest = stack.peek(1).as_limbs()[0];
                let len = stack.peek(3).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, dest, len);
                gas_left -= (schedule.extcodecopy_base_gas + schedule.copy_gas * len.div_ceil(32) + mem_cost) as i64;
                memory.resize(new_len);
                environment_ops::extcodecopy(host, &mut memory, &mut stack);
                Step::Continue
            }
            op::RETURNDATASIZE => { environment_ops::returndatasize(&return_data, &mut stack); Step::Continue }
            op::RETURNDATACOPY => {
                let dest = stack.peek(0).as_limbs()[0];
                let len = stack.peek(2).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, dest, len);
                gas_left -= (schedule.copy_gas * len.div_ceil(32) + mem_cost) as i64;
                memory.resize(new_len);
                match environment_ops::returndatacopy(&return_data, &mut memory, &mut stack) {
                    Some(()) => Step::Continue,
                    None => return finish(StatusCode::InvalidMemoryAccess, 0, gas_refund, Vec::new(), None),
                }
            }
            op::EXTCODEHASH => { gas_left -= schedule.extcodehash_gas as i64; environment_ops::extcodehash(host, &mut stack); Step::Continue }

            op::BLOCKHASH => { gas_left -= schedule.blockhash_gas as i64; environment_ops::blockhash(host, &mut stack); Step::Continue }
            op::COINBASE => { environment_ops::coinbase(&tx, &mut stack); Step::Continue }
            op::TIMESTAMP => { environment_ops::timestamp(&tx, &mut stack); Step::Continue }
            op::NUMBER => { environment_ops::number(&tx, &mut stack); Step::Continue }
            op::DIFFICULTY => { environment_ops::difficulty(&tx, &mut stack); Step::Continue }
            op::GASLIMIT => { environment_ops::gaslimit(&tx, &mut stack); Step::Continue }
            op::CHAINID => { environment_ops::chainid(&tx, &mut stack); Step::Continue }
            op::SELFBALANCE => { environment_ops::selfbalance(host, &frame, &mut stack); Step::Continue }

            op::POP => { stack.pop(); Step::Continue }
            op::MLOAD => {
                let offset = stack.peek(0).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, offset, 32);
                gas_left -= mem_cost as i64;
                memory.resize(new_len);
                memory_ops::mload(&mut memory, &mut stack);
                Step::Continue
            }
            op::MSTORE => {
                let offset = stack.peek(0).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, offset, 32);
                gas_left -= mem_cost as i64;
                memory.resize(new_len);
                memory_ops::mstore(&mut memory, &mut stack);
                Step::Continue
            }
            op::MSTORE8 => {
                let offset = stack.peek(0).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, offset, 1);
                gas_left -= mem_cost as i64;
                memory.resize(new_len);
                memory_ops::mstore8(&mut memory, &mut stack);
                Step::Continue
            }
            op::SLOAD => { gas_left -= schedule.sload_gas as i64; storage_ops::sload(host, frame.recipient, &mut stack); Step::Continue }
            op::SSTORE => {
                let (cost, refund_delta) = storage_ops::sstore(host, schedule, frame.recipient, &mut stack);
                gas_left -= cost as i64;
                gas_refund += refund_delta;
                Step::Continue
            }
            op::JUMP => control_ops::jump(code, &mut stack),
            op::JUMPI => control_ops::jumpi(code, &mut stack),
            op::JUMPC => control_ops::jumpc(code, pc),
            op::JUMPCI => control_ops::jumpci(code, pc, &mut stack),
            op::PC => { environment_ops::pc(pc, &mut stack); Step::Continue }
            op::MSIZE => { memory_ops::msize(&memory, &mut stack); Step::Continue }
            op::GAS => { environment_ops::gas(gas_left, &mut stack); Step::Continue }
            op::JUMPDEST => { gas_left -= schedule.jumpdest_gas as i64; Step::Continue }

            op::PUSHC => {
                let index = code.byte_at(pc + 1);
                stack.push(code.constant(index));
                Step::Continue
            }

            _ if op::is_push(opcode) => {
                let len = op::push_len(opcode) as usize;
                let mut bytes = [0u8; 32];
                for i in 0..len {
                    bytes[32 - len + i] = code.byte_at(pc + 1 + i);
                }
                stack.push(Word::from_be_bytes(bytes));
                Step::Continue
            }
            _ if op::is_dup(opcode) => {
                stack.dup((opcode - op::DUP1 + 1) as usize);
                Step::Continue
            }
            _ if op::is_swap(opcode) => {
                stack.swap((opcode - op::SWAP1 + 1) as usize);
                Step::Continue
            }
            _ if op::is_log(opcode) => {
                let topics = (opcode - op::LOG0) as usize;
                let offset = stack.peek(0).as_limbs()[0];
                let len = stack.peek(1).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, offset, len);
                gas_left -= (schedule.log_gas
                    + schedule.log_topic_gas * topics as u64
                    + schedule.log_data_gas * len
                    + mem_cost) as i64;
                memory.resize(new_len);
                let (data, topic_words) = system_ops::log(&memory, &mut stack, topics);
                host.emit_log(frame.recipient, data, topic_words);
                Step::Continue
            }

            op::CREATE | op::CREATE2 => {
                let offset = stack.peek(1).as_limbs()[0];
                let size = stack.peek(2).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, offset, size);
                gas_left -= (schedule.create_gas + mem_cost) as i64;
                if gas_left < 0 {
                    return finish(StatusCode::OutOfGas, 0, gas_refund, Vec::new(), None);
                }
                memory.resize(new_len);
                let (pending, init_code) = system_ops::decode_create(&mut stack, &memory, opcode);
                let outcome = call_ops::run_create(host, schedule, pending, frame.recipient, frame.depth, gas_left, init_code);
                gas_left = outcome.gas_left_after;
                gas_refund += outcome.gas_refund_delta;
                return_data = outcome.return_data;
                stack.push(outcome.pushed);
                Step::Continue
            }

            op::CALL | op::CALLCODE | op::DELEGATECALL | op::STATICCALL => {
                let mut base_cost = schedule.call_gas;
                let (args_off, args_len, ret_off, ret_len) = match opcode {
                    op::CALL | op::CALLCODE => (
                        stack.peek(3).as_limbs()[0],
                        stack.peek(4).as_limbs()[0],
                        stack.peek(5).as_limbs()[0],
                        stack.peek(6).as_limbs()[0],
                    ),
                    _ => (
                        stack.peek(2).as_limbs()[0],
                        stack.peek(3).as_limbs()[0],
                        stack.peek(4).as_limbs()[0],
                        stack.peek(5).as_limbs()[0],
                    ),
                };
                // Steps 5-6: surcharges computed from the not-yet-popped
                // call-target and value, before the args/ret memory charge.
                let code_address = evm_primitives::word_to_address(&stack.peek(1));
                let call_value = match opcode {
                    op::CALL | op::CALLCODE => stack.peek(2),
                    _ => Word::ZERO,
                };
                let is_value_transfer = call_value > Word::ZERO;
                if is_value_transfer {
                    base_cost += schedule.call_value_transfer_gas;
                }
                if opcode == op::CALL
                    && (is_value_transfer || !schedule.eip158_state_clearing)
                    && !host.account_exists(code_address)
                {
                    base_cost += schedule.call_new_account_gas;
                }
                let (in_cost, in_len) = memory_ops::expansion_charge(&memory, schedule, args_off, args_len);
                let tentative = memory.len().max(in_len);
                let (out_cost, out_len) = {
                    let mut probe = memory.clone();
                    probe.resize(tentative);
                    memory_ops::expansion_charge(&probe, schedule, ret_off, ret_len)
                };
                gas_left -= (base_cost + in_cost + out_cost) as i64;
                if gas_left < 0 {
                    return finish(StatusCode::OutOfGas, 0, gas_refund, Vec::new(), None);
                }
                memory.resize(in_len.max(out_len));
                let (pending, input) = system_ops::decode_call(&mut stack, &memory, opcode);
                let outcome = call_ops::run_call(
                    host,
                    schedule,
                    pending.clone(),
                    frame.recipient,
                    frame.value,
                    frame.sender,
                    frame.flags,
                    frame.depth,
                    gas_left,
                    input,
                );
                gas_left = outcome.gas_left_after;
                gas_refund += outcome.gas_refund_delta;
                let copy_len = outcome.return_data.len().min(pending.ret_size);
                memory.set_slice(pending.ret_offset, &outcome.return_data[..copy_len]);
                return_data = outcome.return_data;
                stack.push(outcome.pushed);
                Step::Continue
            }

            op::RETURN => {
                let offset = stack.peek(0).as_limbs()[0];
                let len = stack.peek(1).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, offset, len);
                gas_left -= mem_cost as i64;
                if gas_left < 0 {
                    return finish(StatusCode::OutOfGas, 0, gas_refund, Vec::new(), None);
                }
                memory.resize(new_len);
                system_ops::ret(&memory, &mut stack)
            }
            op::REVERT => {
                let offset = stack.peek(0).as_limbs()[0];
                let len = stack.peek(1).as_limbs()[0];
                let (mem_cost, new_len) = memory_ops::expansion_charge(&memory, schedule, offset, len);
                gas_left -= mem_cost as i64;
                if gas_left < 0 {
                    return finish(StatusCode::OutOfGas, 0, gas_refund, Vec::new(), None);
                }
                memory.resize(new_len);
                system_ops::revert(&memory, &mut stack)
            }
            op::INVALID => Step::Trap(StatusCode::InvalidInstruction),
            op::SELFDESTRUCT => {
                gas_left -= schedule.selfdestruct_gas as i64;
                let beneficiary = system_ops::selfdestruct_beneficiary(&mut stack);
                let created_new_account = host.selfdestruct(frame.recipient, beneficiary);
                if created_new_account {
                    gas_left -= schedule.selfdestruct_to_new_account_cost as i64;
                }
                gas_refund += schedule.selfdestruct_refund_gas as i64;
                Step::SelfDestruct
            }

            _ => Step::Trap(StatusCode::UndefinedInstruction),
        };

        if gas_left < 0 {
            return finish(StatusCode::OutOfGas, 0, gas_refund, Vec::new(), None);
        }

        match step {
            Step::Continue => {
                pc += step_width(code, pc, opcode);
            }
            Step::Jump(dest) => pc = dest,
            Step::Stop => return finish(StatusCode::Success, gas_left, gas_refund, Vec::new(), None),
            Step::Return(data) => return finish(StatusCode::Success, gas_left, gas_refund, data, None),
            Step::Revert(data) => return finish(StatusCode::Revert, gas_left, gas_refund, data, None),
            Step::SelfDestruct => return finish(StatusCode::Success, gas_left, 0, Vec::new(), None),
            Step::Trap(status) => {
                let gas = if status.retains_gas() { gas_left } else { 0 };
                return finish(status, gas, gas_refund, Vec::new(), None);
            }
        }
    }
}

/// Total byte width of the opcode at `pc`, for advancing past a
/// `Step::Continue` result: 1 for ordinary opcodes, `1 + n` for `PUSHn`,
/// and `PUSHC`'s recorded original footprint (it keeps the replaced
/// `PUSHn`'s width rather than shrinking to 2 bytes).
fn step_width(code: &Code, pc: usize, opcode: u8) -> usize {
    if op::is_push(opcode) {
        1 + op::push_len(opcode) as usize
    } else if opcode == op::PUSHC {
        code.pushc_width(pc)
    } else {
        1
    }
}

fn finish(status: StatusCode, gas_left: i64, gas_refund: i64, output: Vec<u8>, created_address: Option<evm_primitives::Address>) -> CallResult {
    CallResult {
        status,
        gas_left,
        gas_refunded: gas_refund,
        output,
        created_address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{CallFlags, CallFrame, CallKind};
    use crate::host::{Host, StorageStatus, TxContext};
    use evm_primitives::{Address, Hash};
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestHost {
        storage: HashMap<(Address, Word), Word>,
        balances: HashMap<Address, Word>,
    }

    impl Host for TestHost {
        fn account_exists(&mut self, _addr: Address) -> bool {
            true
        }
        fn get_storage(&mut self, addr: Address, key: Word) -> Word {
            *self.storage.get(&(addr, key)).unwrap_or(&Word::ZERO)
        }
        fn set_storage(&mut self, addr: Address, key: Word, value: Word) -> StorageStatus {
            let existing = self.get_storage(addr, key);
            self.storage.insert((addr, key), value);
            if existing.is_zero() && !value.is_zero() {
                StorageStatus::Added
            } else if !existing.is_zero() && value.is_zero() {
                StorageStatus::Deleted
            } else {
                StorageStatus::Modified
            }
        }
        fn get_balance(&mut self, addr: Address) -> Word {
            *self.balances.get(&addr).unwrap_or(&Word::ZERO)
        }
        fn get_code_size(&mut self, _addr: Address) -> u64 {
            0
        }
        fn get_code_hash(&mut self, _addr: Address) -> Hash {
            Hash::ZERO
        }
        fn copy_code(&mut self, _addr: Address, _offset: u64, _buf: &mut [u8]) -> u64 {
            0
        }
        fn selfdestruct(&mut self, _self_addr: Address, _beneficiary: Address) -> bool {
            false
        }
        fn emit_log(&mut self, _addr: Address, _data: Vec<u8>, _topics: Vec<Word>) {}
        fn get_tx_context(&mut self) -> TxContext {
            TxContext {
                origin: Address::ZERO,
                gas_price: Word::from(1),
                coinbase: Address::ZERO,
                number: 1,
                timestamp: 1,
                gas_limit: 30_000_000,
                difficulty: Word::ZERO,
                chain_id: 1,
            }
        }
        fn get_block_hash(&mut self, _number: u64) -> Hash {
            Hash::ZERO
        }
        fn call(&mut self, _frame: CallFrame) -> CallResult {
            CallResult::failure(StatusCode::Failure)
        }
    }

    fn frame_with_gas(gas: i64) -> CallFrame {
        CallFrame {
            kind: CallKind::Call,
            flags: CallFlags::NONE,
            depth: 0,
            gas,
            recipient: Address::ZERO,
            sender: Address::ZERO,
            value: Word::ZERO,
            input: Vec::new(),
            code_hash: Hash::ZERO,
            salt: None,
        }
    }

    #[test]
    fn simple_add_then_return() {
        // PUSH1 2, PUSH1 3, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let bytecode = [
            0x60, 0x02, 0x60, 0x03, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
        ];
        let code = Code::new(&bytecode, false);
        let schedule = Schedule::for_revision(Revision::Berlin);
        let mut host = TestHost::default();
        let result = run(&mut host, Revision::Berlin, &schedule, frame_with_gas(100_000), &code);
        assert_eq!(result.status, StatusCode::Success);
        assert_eq!(Word::from_be_bytes::<32>(result.output.try_into().unwrap()), Word::from(5));
    }

    #[test]
    fn jump_to_non_jumpdest_traps() {
        // PUSH1 4, JUMP, (byte 2 is padding) ...
        let bytecode = [0x60, 0x04, 0x56];
        let code = Code::new(&bytecode, false);
        let schedule = Schedule::for_revision(Revision::Berlin);
        let mut host = TestHost::default();
        let result = run(&mut host, Revision::Berlin, &schedule, frame_with_gas(100_000), &code);
        assert_eq!(result.status, StatusCode::BadJumpDestination);
    }

    #[test]
    fn out_of_gas_burns_everything() {
        let bytecode = [0x60, 0x02, 0x60, 0x03, 0x01, 0x00]; // PUSH1 2, PUSH1 3, ADD, STOP
        let code = Code::new(&bytecode, false);
        let schedule = Schedule::for_revision(Revision::Berlin);
        let mut host = TestHost::default();
        let result = run(&mut host, Revision::Berlin, &schedule, frame_with_gas(4), &code);
        assert_eq!(result.status, StatusCode::OutOfGas);
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn sdiv_overflow_case_succeeds_without_trapping() {
        // PUSH32 MIN_SIGNED, PUSH32 -1, SDIV, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let mut bytecode = vec![0x7f];
        bytecode.extend_from_slice(&[0x80u8]);
        bytecode.extend_from_slice(&[0u8; 31]);
        bytecode.push(0x7f);
        bytecode.extend_from_slice(&[0xffu8; 32]);
        bytecode.extend_from_slice(&[0x05, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3]);
        let code = Code::new(&bytecode, false);
        let schedule = Schedule::for_revision(Revision::Berlin);
        let mut host = TestHost::default();
        let result = run(&mut host, Revision::Berlin, &schedule, frame_with_gas(100_000), &code);
        assert_eq!(result.status, StatusCode::Success);
        let out = Word::from_be_bytes::<32>(result.output.try_into().unwrap());
        assert_eq!(out, evm_primitives::arithmetic::min_signed());
    }

    #[derive(Default)]
    struct RecordingHost {
        last_call_frame: Option<CallFrame>,
    }

    impl Host for RecordingHost {
        fn account_exists(&mut self, _addr: Address) -> bool {
            false
        }
        fn get_storage(&mut self, _addr: Address, _key: Word) -> Word {
            Word::ZERO
        }
        fn set_storage(&mut self, _addr: Address, _key: Word, _value: Word) -> StorageStatus {
            StorageStatus::Unchanged
        }
        fn get_balance(&mut self, _addr: Address) -> Word {
            Word::ZERO
        }
        fn get_code_size(&mut self, _addr: Address) -> u64 {
            0
        }
        fn get_code_hash(&mut self, _addr: Address) -> Hash {
            Hash::ZERO
        }
        fn copy_code(&mut self, _addr: Address, _offset: u64, _buf: &mut [u8]) -> u64 {
            0
        }
        fn selfdestruct(&mut self, _self_addr: Address, _beneficiary: Address) -> bool {
            false
        }
        fn emit_log(&mut self, _addr: Address, _data: Vec<u8>, _topics: Vec<Word>) {}
        fn get_tx_context(&mut self) -> TxContext {
            TxContext {
                origin: Address::ZERO,
                gas_price: Word::from(1),
                coinbase: Address::ZERO,
                number: 1,
                timestamp: 1,
                gas_limit: 30_000_000,
                difficulty: Word::ZERO,
                chain_id: 1,
            }
        }
        fn get_block_hash(&mut self, _number: u64) -> Hash {
            Hash::ZERO
        }
        fn call(&mut self, frame: CallFrame) -> CallResult {
            self.last_call_frame = Some(frame.clone());
            CallResult {
                status: StatusCode::Success,
                gas_left: frame.gas,
                gas_refunded: 0,
                output: Vec::new(),
                created_address: None,
            }
        }
    }

    #[test]
    fn delegatecall_forwards_the_outer_callers_sender_not_its_own_address() {
        // DELEGATECALL(gas=0x2710, addr=1, argsOffset=0, argsLength=0, retOffset=0, retLength=0)
        let bytecode = [
            0x60, 0x00, // PUSH1 0   retLength
            0x60, 0x00, // PUSH1 0   retOffset
            0x60, 0x00, // PUSH1 0   argsLength
            0x60, 0x00, // PUSH1 0   argsOffset
            0x60, 0x01, // PUSH1 1   code address
            0x61, 0x27, 0x10, // PUSH2 0x2710   gas
            0xf4, // DELEGATECALL
            0x00, // STOP
        ];
        let code = Code::new(&bytecode, false);
        let schedule = Schedule::for_revision(Revision::Berlin);
        let mut host = RecordingHost::default();

        let caller = Address::from([0xaa; 20]);
        let original_sender = Address::from([0xbb; 20]);
        let mut frame = frame_with_gas(1_000_000);
        frame.kind = CallKind::DelegateCall;
        frame.recipient = caller;
        frame.sender = original_sender;

        let result = run(&mut host, Revision::Berlin, &schedule, frame, &code);
        assert_eq!(result.status, StatusCode::Success);

        let sub_frame = host.last_call_frame.expect("host.call was invoked");
        assert_eq!(sub_frame.kind, CallKind::DelegateCall);
        assert_eq!(sub_frame.recipient, caller);
        assert_eq!(sub_frame.sender, original_sender);
    }

    #[test]
    fn sstore_on_fresh_slot_refunds_nothing_but_added_status_is_flat_cost() {
        let bytecode = [0x60, 0x01, 0x60, 0x00, 0x55, 0x00]; // PUSH1 1, PUSH1 0, SSTORE, STOP
        let code = Code::new(&bytecode, false);
        let schedule = Schedule::for_revision(Revision::Berlin);
        let mut host = TestHost::default();
        let result = run(&mut host, Revision::Berlin, &schedule, frame_with_gas(100_000), &code);
        assert_eq!(result.status, StatusCode::Success);
        assert_eq!(host.get_storage(Address::ZERO, Word::ZERO), Word::from(1));
    }
}
