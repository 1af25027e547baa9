//! Net-storage-change accounting with refunds (C8, §4.7).
//!
//! Takes the `StorageStatus` the host returned from a `set_storage` call and
//! produces the `(runtime_cost, refund_delta)` pair the interpreter charges
//! and accumulates. The refund counter may go negative intermediately;
//! clamping the final net-negative refund at zero is the outer caller's
//! job (outside this core, per §4.7's closing note).

use crate::host::StorageStatus;
use crate::schedule::Schedule;

/// `(runtime gas cost, refund delta)` for one `SSTORE`.
pub fn sstore_cost(schedule: &Schedule, status: StorageStatus) -> (u64, i64) {
    use StorageStatus::*;

    let unchanged = schedule.sstore_unchanged_gas as i64;
    let set = schedule.sstore_set_gas as i64;
    let reset = schedule.sstore_reset_gas as i64;
    let refund = schedule.sstore_refund_gas as i64;

    match status {
        Unchanged => (schedule.sstore_unchanged_gas, 0),
        Added => (schedule.sstore_set_gas, 0),
        Modified => (schedule.sstore_reset_gas, 0),
        Deleted => (schedule.sstore_reset_gas, refund),
        DirtyAddedToDeleted => (schedule.sstore_unchanged_gas, set - unchanged),
        DirtyDeletedReverted => (schedule.sstore_unchanged_gas, reset - unchanged - refund),
        DirtyDeletedToAdded => (schedule.sstore_unchanged_gas, -refund),
        DirtyModifiedToDeleted => (schedule.sstore_unchanged_gas, refund),
        DirtyModifiedReverted => (schedule.sstore_unchanged_gas, reset - unchanged),
        DirtyModifiedAgain => (schedule.sstore_unchanged_gas, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evm_primitives::Revision;

    #[test]
    fn added_and_deleted_use_flat_costs() {
        let s = Schedule::for_revision(Revision::Berlin);
        assert_eq!(sstore_cost(&s, StorageStatus::Added).0, s.sstore_set_gas);
        let (cost, refund) = sstore_cost(&s, StorageStatus::Deleted);
        assert_eq!(cost, s.sstore_reset_gas);
        assert_eq!(refund, s.sstore_refund_gas as i64);
    }

    #[test]
    fn dirty_transitions_use_unchanged_cost() {
        let s = Schedule::for_revision(Revision::Berlin);
        for status in [
            StorageStatus::DirtyAddedToDeleted,
            StorageStatus::DirtyDeletedReverted,
            StorageStatus::DirtyDeletedToAdded,
            StorageStatus::DirtyModifiedToDeleted,
            StorageStatus::DirtyModifiedReverted,
            StorageStatus::DirtyModifiedAgain,
        ] {
            assert_eq!(sstore_cost(&s, status).0, s.sstore_unchanged_gas);
        }
    }
}
