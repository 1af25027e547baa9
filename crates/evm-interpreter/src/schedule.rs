//! Cost schedule and other parameterizations for the EVM (C2).
//!
//! Grounded on the retrieved OpenEthereum `crates/vm/vm/src/schedule.rs`:
//! one plain data struct per revision family, built incrementally by
//! mutating the previous revision's schedule. Field names follow that
//! reference so the mapping to `spec.md` §4.2's named constants (`Gm`,
//! `Dq`, `sstoreSetGas`, ...) is direct.

use evm_primitives::Revision;

/// EIP-2929 constants, named exactly as spec §4.7 and the Berlin fork use them.
pub const COLD_SLOAD_COST: u64 = 2100;
pub const COLD_ACCOUNT_ACCESS_COST: u64 = 2600;
pub const WARM_STORAGE_READ_COST: u64 = 100;

/// Definition of the cost schedule for one protocol revision.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub have_delegate_call: bool,
    pub have_create2: bool,
    pub have_revert: bool,
    pub have_return_data: bool,
    pub have_bitwise_shifting: bool,
    pub have_chain_id: bool,
    pub have_selfbalance: bool,
    pub have_extcodehash: bool,
    pub have_static_call: bool,

    pub stack_limit: usize,
    pub max_depth: usize,

    /// Gas prices for instructions in all tiers (`tier_step_gas[tier]`).
    pub tier_step_gas: [u64; 8],

    pub exp_gas: u64,
    pub exp_byte_gas: u64,
    pub sha3_gas: u64,
    pub sha3_word_gas: u64,

    pub sload_gas: u64,
    pub sstore_set_gas: u64,
    pub sstore_reset_gas: u64,
    pub sstore_refund_gas: u64,
    /// `sstoreUnchangedGas`, the net-metering baseline cost (Constantinople+).
    pub sstore_unchanged_gas: u64,

    pub jumpdest_gas: u64,
    pub log_gas: u64,
    pub log_data_gas: u64,
    pub log_topic_gas: u64,

    pub create_gas: u64,
    pub call_gas: u64,

    pub call_stipend: u64,
    pub call_value_transfer_gas: u64,
    pub call_new_account_gas: u64,

    pub selfdestruct_refund_gas: u64,
    pub selfdestruct_gas: u64,
    pub selfdestruct_to_new_account_cost: u64,

    /// `Gm`: linear coefficient of the memory expansion cost.
    pub memory_gas: u64,
    /// `Dq`: quadratic divisor of the memory expansion cost.
    pub quad_coeff_div: u64,
    /// `Gc`: gas per word copied (CALLDATACOPY, CODECOPY, ...).
    pub copy_gas: u64,

    pub extcodesize_gas: u64,
    pub extcodecopy_base_gas: u64,
    pub balance_gas: u64,
    pub extcodehash_gas: u64,
    pub blockhash_gas: u64,

    /// `Some(64)` selects the "all-but-one-64th" forwarding rule (§4.5 step 8).
    pub sub_gas_cap_divisor: Option<u64>,

    pub eip1283_net_metering: bool,
    pub max_refund_quotient: u64,

    /// EIP-161 (Spurious Dragon): before this, `callNewAccount` is charged
    /// for any CALL to a nonexistent account regardless of value; after,
    /// only value-transferring calls pay it (§4.5 step 5).
    pub eip158_state_clearing: bool,
}

impl Schedule {
    fn frontier_base() -> Schedule {
        Schedule {
            have_delegate_call: false,
            have_create2: false,
            have_revert: false,
            have_return_data: false,
            have_bitwise_shifting: false,
            have_chain_id: false,
            have_selfbalance: false,
            have_extcodehash: false,
            have_static_call: false,
            stack_limit: 1024,
            max_depth: 1024,
            tier_step_gas: [0, 2, 3, 5, 8, 10, 20, 0],
            exp_gas: 10,
            exp_byte_gas: 10,
            sha3_gas: 30,
            sha3_word_gas: 6,
            sload_gas: 50,
            sstore_set_gas: 20000,
            sstore_reset_gas: 5000,
            sstore_refund_gas: 15000,
            sstore_unchanged_gas: 200,
            jumpdest_gas: 1,
            log_gas: 375,
            log_data_gas: 8,
            log_topic_gas: 375,
            create_gas: 32000,
            call_gas: 40,
            call_stipend: 2300,
            call_value_transfer_gas: 9000,
            call_new_account_gas: 25000,
            selfdestruct_refund_gas: 24000,
            selfdestruct_gas: 0,
            selfdestruct_to_new_account_cost: 0,
            memory_gas: 3,
            quad_coeff_div: 512,
            copy_gas: 3,
            extcodesize_gas: 20,
            extcodecopy_base_gas: 20,
            balance_gas: 20,
            extcodehash_gas: 400,
            blockhash_gas: 20,
            sub_gas_cap_divisor: None,
            eip1283_net_metering: false,
            max_refund_quotient: 2,
            eip158_state_clearing: false,
        }
    }

    fn homestead() -> Schedule {
        let mut s = Self::frontier_base();
        s.have_delegate_call = true;
        s
    }

    fn tangerine_whistle() -> Schedule {
        let mut s = Self::homestead();
        s.sload_gas = 200;
        s.call_gas = 700;
        s.extcodesize_gas = 700;
        s.extcodecopy_base_gas = 700;
        s.balance_gas = 400;
        s.selfdestruct_gas = 5000;
        s.selfdestruct_to_new_account_cost = 25000;
        s.sub_gas_cap_divisor = Some(64);
        s
    }

    fn spurious_dragon() -> Schedule {
        let mut s = Self::tangerine_whistle();
        s.eip158_state_clearing = true;
        s
    }

    fn byzantium() -> Schedule {
        let mut s = Self::spurious_dragon();
        s.have_create2 = false;
        s.have_revert = true;
        s.have_return_data = true;
        s.have_static_call = true;
        s
    }

    fn constantinople() -> Schedule {
        let mut s = Self::byzantium();
        s.have_create2 = true;
        s.have_bitwise_shifting = true;
        s.have_extcodehash = true;
        s.eip1283_net_metering = true;
        s
    }

    fn petersburg() -> Schedule {
        // Petersburg reverted EIP-1283's net-metering (re-disabled after the
        // Constantinople St. Petersburg hot-fix) but kept everything else.
        let mut s = Self::constantinople();
        s.eip1283_net_metering = false;
        s
    }

    fn istanbul() -> Schedule {
        let mut s = Self::petersburg();
        s.have_chain_id = true;
        s.have_selfbalance = true;
        s.sload_gas = 800;
        s.balance_gas = 700;
        s.extcodehash_gas = 700;
        s.eip1283_net_metering = true;
        s.sstore_unchanged_gas = 800;
        s
    }

    fn berlin() -> Schedule {
        let mut s = Self::istanbul();
        s.sload_gas = WARM_STORAGE_READ_COST;
        s.call_gas = COLD_ACCOUNT_ACCESS_COST;
        s.balance_gas = COLD_ACCOUNT_ACCESS_COST;
        s.extcodecopy_base_gas = COLD_ACCOUNT_ACCESS_COST;
        s.extcodehash_gas = COLD_ACCOUNT_ACCESS_COST;
        s.extcodesize_gas = COLD_ACCOUNT_ACCESS_COST;
        s.sstore_reset_gas = 5000 - COLD_SLOAD_COST;
        s.sstore_unchanged_gas = WARM_STORAGE_READ_COST;
        s
    }

    /// Builds the schedule for a given protocol revision.
    pub fn for_revision(revision: Revision) -> Schedule {
        match revision {
            Revision::Frontier => Self::frontier_base(),
            Revision::Homestead => Self::homestead(),
            Revision::TangerineWhistle => Self::tangerine_whistle(),
            Revision::SpuriousDragon => Self::spurious_dragon(),
            Revision::Byzantium => Self::byzantium(),
            Revision::Constantinople => Self::constantinople(),
            Revision::Petersburg => Self::petersburg(),
            Revision::Istanbul => Self::istanbul(),
            Revision::Berlin => Self::berlin(),
        }
    }

    /// `memGas(n) = Gm * words + words^2 / Dq`, per spec §4.2 step 5.
    pub fn memory_expansion_cost(&self, size_bytes: u64) -> u64 {
        let words = size_bytes.div_ceil(32);
        self.memory_gas * words + (words * words) / self.quad_coeff_div
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_coeff_div_is_512_for_every_revision() {
        for revision in [
            Revision::Frontier,
            Revision::Homestead,
            Revision::Berlin,
        ] {
            assert_eq!(Schedule::for_revision(revision).quad_coeff_div, 512);
        }
    }

    #[test]
    fn state_clearing_turns_on_at_spurious_dragon() {
        assert!(!Schedule::for_revision(Revision::TangerineWhistle).eip158_state_clearing);
        assert!(Schedule::for_revision(Revision::SpuriousDragon).eip158_state_clearing);
        assert!(Schedule::for_revision(Revision::Berlin).eip158_state_clearing);
    }

    #[test]
    fn berlin_reprices_sload_and_balance() {
        let s = Schedule::for_revision(Revision::Berlin);
        assert_eq!(s.sload_gas, WARM_STORAGE_READ_COST);
        assert_eq!(s.balance_gas, COLD_ACCOUNT_ACCESS_COST);
    }

    #[test]
    fn memory_expansion_cost_is_quadratic() {
        let s = Schedule::for_revision(Revision::Frontier);
        assert_eq!(s.memory_expansion_cost(0), 0);
        assert_eq!(s.memory_expansion_cost(32), 3);
        // 32 words: 3*32 + 32*32/512 = 96 + 2 = 98
        assert_eq!(s.memory_expansion_cost(1024), 98);
    }
}
