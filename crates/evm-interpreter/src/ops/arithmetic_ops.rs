//! Stack-level wiring for the arithmetic opcodes (§4.1, §4.2) onto the
//! free functions in `evm_primitives::arithmetic`.

use evm_primitives::{arithmetic, Word};

use crate::stack::Stack;

pub fn add(stack: &mut Stack) {
    let (a, b) = (stack.pop(), stack.pop());
    stack.push(a.wrapping_add(b));
}

pub fn mul(stack: &mut Stack) {
    let (a, b) = (stack.pop(), stack.pop());
    stack.push(a.wrapping_mul(b));
}

pub fn sub(stack: &mut Stack) {
    let (a, b) = (stack.pop(), stack.pop());
    stack.push(a.wrapping_sub(b));
}

pub fn div(stack: &mut Stack) {
    let (a, b) = (stack.pop(), stack.pop());
    stack.push(arithmetic::udiv(a, b));
}

pub fn sdiv(stack: &mut Stack) {
    let (a, b) = (stack.pop(), stack.pop());
    stack.push(arithmetic::sdiv(a, b));
}

pub fn rem(stack: &mut Stack) {
    let (a, b) = (stack.pop(), stack.pop());
    stack.push(arithmetic::umod(a, b));
}

pub fn smod(stack: &mut Stack) {
    let (a, b) = (stack.pop(), stack.pop());
    stack.push(arithmetic::smod(a, b));
}

pub fn addmod(stack: &mut Stack) {
    let (a, b, m) = (stack.pop(), stack.pop(), stack.pop());
    stack.push(arithmetic::addmod(a, b, m));
}

pub fn mulmod(stack: &mut Stack) {
    let (a, b, m) = (stack.pop(), stack.pop(), stack.pop());
    stack.push(arithmetic::mulmod(a, b, m));
}

/// `EXP`'s gas cost depends on the exponent's byte length, so the handler
/// peeks both operands before popping to let the dispatch loop charge the
/// per-byte surcharge (§4.2 step 3's `Special` tier).
pub fn exp_gas_surcharge(schedule_exp_byte_gas: u64, exponent: Word) -> u64 {
    arithmetic::exp_byte_len(&exponent) * schedule_exp_byte_gas
}

pub fn exp(stack: &mut Stack) {
    let (base, exponent) = (stack.pop(), stack.pop());
    stack.push(arithmetic::exp(base, exponent));
}

pub fn signextend(stack: &mut Stack) {
    let (k, w) = (stack.pop(), stack.pop());
    stack.push(arithmetic::signextend(k, w));
}
