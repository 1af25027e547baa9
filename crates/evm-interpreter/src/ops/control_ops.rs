//! `JUMP`/`JUMPI`/`JUMPDEST` and their preprocessor-fused counterparts
//! `JUMPC`/`JUMPCI` (C6, §4.4).

use evm_primitives::{StatusCode, Word};

use crate::code::Code;
use crate::stack::Stack;
use crate::step::Step;

fn word_to_pc(w: Word) -> Option<usize> {
    if w > Word::from(usize::MAX) {
        None
    } else {
        Some(w.as_limbs()[0] as usize)
    }
}

pub fn jump(code: &Code, stack: &mut Stack) -> Step {
    let dest = stack.pop();
    match word_to_pc(dest) {
        Some(pc) if code.jump_destination_is_valid(pc) => Step::Jump(pc),
        _ => Step::Trap(StatusCode::BadJumpDestination),
    }
}

pub fn jumpi(code: &Code, stack: &mut Stack) -> Step {
    let dest = stack.pop();
    let cond = stack.pop();
    if cond.is_zero() {
        return Step::Continue;
    }
    match word_to_pc(dest) {
        Some(pc) if code.jump_destination_is_valid(pc) => Step::Jump(pc),
        _ => Step::Trap(StatusCode::BadJumpDestination),
    }
}

/// `JUMPC`: the fused unconditional jump. The preprocessor already proved
/// the destination valid, so this never traps; `pc` carries the original
/// `PUSH32` immediate's offset, 1 byte into the fused instruction.
pub fn jumpc(code: &Code, pc: usize) -> Step {
    let dest_bytes = code.immediate32(pc + 1);
    Step::Jump(Word::from_be_bytes(dest_bytes).as_limbs()[0] as usize)
}

/// `JUMPCI`: the fused conditional jump; the condition is still a runtime
/// stack value, but the destination itself needs no re-validation.
pub fn jumpci(code: &Code, pc: usize, stack: &mut Stack) -> Step {
    let cond = stack.pop();
    if cond.is_zero() {
        return Step::Continue;
    }
    let dest_bytes = code.immediate32(pc + 1);
    Step::Jump(Word::from_be_bytes(dest_bytes).as_limbs()[0] as usize)
}
