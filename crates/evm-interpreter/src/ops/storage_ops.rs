//! `SLOAD`/`SSTORE` (C8, §4.7).

use evm_primitives::Address;

use crate::host::Host;
use crate::schedule::Schedule;
use crate::stack::Stack;
use crate::storage_gas::sstore_cost;

pub fn sload<H: Host>(host: &mut H, addr: Address, stack: &mut Stack) {
    let key = stack.pop();
    stack.push(host.get_storage(addr, key));
}

/// Returns the runtime gas cost and refund delta for this `SSTORE`; the
/// caller (the dispatch loop) charges the cost and folds the refund delta
/// into the running total before continuing.
pub fn sstore<H: Host>(host: &mut H, schedule: &Schedule, addr: Address, stack: &mut Stack) -> (u64, i64) {
    let key = stack.pop();
    let value = stack.pop();
    let status = host.set_storage(addr, key, value);
    sstore_cost(schedule, status)
}
