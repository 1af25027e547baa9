//! Per-opcode metadata: stack effect, gas tier, and revision gating (C3).
//!
//! The table is a single dense array indexed by opcode byte, built once by
//! `OPCODES` via a `const fn`. `spec.md` §9 calls out that the reference
//! implementation carries two divergent copies of this table (one missing
//! `LOG*`/`BALANCE`/`EXTCODESIZE`'s Istanbul-era costs); this crate ships
//! exactly one, so that defect cannot recur.

use evm_primitives::Revision;

/// Raw opcode byte constants (public so callers can match on them directly).
#[allow(non_upper_case_globals, dead_code)]
pub mod op {
    pub const STOP: u8 = 0x00;
    pub const ADD: u8 = 0x01;
    pub const MUL: u8 = 0x02;
    pub const SUB: u8 = 0x03;
    pub const DIV: u8 = 0x04;
    pub const SDIV: u8 = 0x05;
    pub const MOD: u8 = 0x06;
    pub const SMOD: u8 = 0x07;
    pub const ADDMOD: u8 = 0x08;
    pub const MULMOD: u8 = 0x09;
    pub const EXP: u8 = 0x0a;
    pub const SIGNEXTEND: u8 = 0x0b;

    pub const LT: u8 = 0x10;
    pub const GT: u8 = 0x11;
    pub const SLT: u8 = 0x12;
    pub const SGT: u8 = 0x13;
    pub const EQ: u8 = 0x14;
    pub const ISZERO: u8 = 0x15;
    pub const AND: u8 = 0x16;
    pub const OR: u8 = 0x17;
    pub const XOR: u8 = 0x18;
    pub const NOT: u8 = 0x19;
    pub const BYTE: u8 = 0x1a;
    pub const SHL: u8 = 0x1b;
    pub const SHR: u8 = 0x1c;
    pub const SAR: u8 = 0x1d;

    pub const KECCAK256: u8 = 0x20;

    pub const ADDRESS: u8 = 0x30;
    pub const BALANCE: u8 = 0x31;
    pub const ORIGIN: u8 = 0x32;
    pub const CALLER: u8 = 0x33;
    pub const CALLVALUE: u8 = 0x34;
    pub const CALLDATALOAD: u8 = 0x35;
    pub const CALLDATASIZE: u8 = 0x36;
    pub const CALLDATACOPY: u8 = 0x37;
    pub const CODESIZE: u8 = 0x38;
    pub const CODECOPY: u8 = 0x39;
    pub const GASPRICE: u8 = 0x3a;
    pub const EXTCODESIZE: u8 = 0x3b;
    pub const EXTCODECOPY: u8 = 0x3c;
    pub const RETURNDATASIZE: u8 = 0x3d;
    pub const RETURNDATACOPY: u8 = 0x3e;
    pub const EXTCODEHASH: u8 = 0x3f;

    pub const BLOCKHASH: u8 = 0x40;
    pub const COINBASE: u8 = 0x41;
    pub const TIMESTAMP: u8 = 0x42;
    pub const NUMBER: u8 = 0x43;
    pub const DIFFICULTY: u8 = 0x44;
    pub const GASLIMIT: u8 = 0x45;
    pub const CHAINID: u8 = 0x46;
    pub const SELFBALANCE: u8 = 0x47;

    pub const POP: u8 = 0x50;
    pub const MLOAD: u8 = 0x51;
    pub const MSTORE: u8 = 0x52;
    pub const MSTORE8: u8 = 0x53;
    pub const SLOAD: u8 = 0x54;
    pub const SSTORE: u8 = 0x55;
    pub const JUMP: u8 = 0x56;
    pub const JUMPI: u8 = 0x57;
    pub const PC: u8 = 0x58;
    pub const MSIZE: u8 = 0x59;
    pub const GAS: u8 = 0x5a;
    pub const JUMPDEST: u8 = 0x5b;

    pub const PUSH1: u8 = 0x60;
    pub const PUSH32: u8 = 0x7f;

    pub const DUP1: u8 = 0x80;
    pub const DUP16: u8 = 0x8f;

    pub const SWAP1: u8 = 0x90;
    pub const SWAP16: u8 = 0x9f;

    pub const LOG0: u8 = 0xa0;
    pub const LOG4: u8 = 0xa4;

    /// Internal, unforgeable: a PUSH32-then-JUMP pair folded by the
    /// preprocessor (C6 pass 2). Never present in user bytecode.
    pub const JUMPC: u8 = 0xb0;
    /// Internal, unforgeable: a PUSH32-then-JUMPI pair folded by the
    /// preprocessor (C6 pass 2).
    pub const JUMPCI: u8 = 0xb1;
    /// Internal, unforgeable: a large PUSH constant interned into the
    /// contract's constant pool (C6 pass 2).
    pub const PUSHC: u8 = 0xb2;

    pub const CREATE: u8 = 0xf0;
    pub const CALL: u8 = 0xf1;
    pub const CALLCODE: u8 = 0xf2;
    pub const RETURN: u8 = 0xf3;
    pub const DELEGATECALL: u8 = 0xf4;
    pub const CREATE2: u8 = 0xf5;
    pub const STATICCALL: u8 = 0xfa;
    pub const REVERT: u8 = 0xfd;
    pub const INVALID: u8 = 0xfe;
    pub const SELFDESTRUCT: u8 = 0xff;

    /// True for the three preprocessor-internal opcodes; these must never
    /// appear in bytecode the preprocessor did not itself emit.
    pub const fn is_internal(opcode: u8) -> bool {
        matches!(opcode, JUMPC | JUMPCI | PUSHC)
    }

    pub const fn is_push(opcode: u8) -> bool {
        opcode >= PUSH1 && opcode <= PUSH32
    }

    pub const fn push_len(opcode: u8) -> u8 {
        opcode - PUSH1 + 1
    }

    pub const fn is_dup(opcode: u8) -> bool {
        opcode >= DUP1 && opcode <= DUP16
    }

    pub const fn is_swap(opcode: u8) -> bool {
        opcode >= SWAP1 && opcode <= SWAP16
    }

    pub const fn is_log(opcode: u8) -> bool {
        opcode >= LOG0 && opcode <= LOG4
    }
}

/// Which gas tier an opcode's base cost is drawn from (§4.2 step 3).
/// `Special` means the opcode handler computes the entire base cost itself
/// (SHA3, SLOAD, SSTORE, CALL*, CREATE*, LOG*, EXP, ...), so the dispatch
/// loop contributes 0 before invoking the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasTier {
    Zero,
    Base,
    VeryLow,
    Low,
    Mid,
    High,
    Special,
}

/// Static, per-opcode metadata consulted before dispatch (§4.2 step 2).
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub stack_in: u16,
    /// Net stack delta (`stack_out - stack_in`), may be negative.
    pub stack_delta: i16,
    pub tier: GasTier,
    pub since: Revision,
}

const fn info(
    name: &'static str,
    stack_in: u16,
    stack_delta: i16,
    tier: GasTier,
    since: Revision,
) -> OpInfo {
    OpInfo {
        name,
        stack_in,
        stack_delta,
        tier,
        since,
    }
}

/// Looks up static metadata for `opcode`, or `None` if the byte is
/// undefined for every revision (dispatch then reports
/// `StatusCode::UndefinedInstruction`).
pub fn opcode_info(opcode: u8) -> Option<OpInfo> {
    use GasTier::*;
    use Revision::*;

    if op::is_push(opcode) {
        return Some(info("PUSH", 0, 1, VeryLow, Frontier));
    }
    if op::is_dup(opcode) {
        let n = (opcode - op::DUP1 + 1) as u16;
        return Some(info("DUP", n, 1, VeryLow, Frontier));
    }
    if op::is_swap(opcode) {
        let n = (opcode - op::SWAP1 + 2) as u16;
        return Some(info("SWAP", n, 0, VeryLow, Frontier));
    }
    if op::is_log(opcode) {
        let topics = (opcode - op::LOG0) as u16;
        return Some(info("LOG", 2 + topics, -(2 + topics as i16), Special, Frontier));
    }

    Some(match opcode {
        op::STOP => info("STOP", 0, 0, Zero, Frontier),
        op::ADD => info("ADD", 2, -1, VeryLow, Frontier),
        op::MUL => info("MUL", 2, -1, Low, Frontier),
        op::SUB => info("SUB", 2, -1, VeryLow, Frontier),
        op::DIV => info("DIV", 2, -1, Low, Frontier),
        op::SDIV => info("SDIV", 2, -1, Low, Frontier),
        op::MOD => info("MOD", 2, -1, Low, Frontier),
        op::SMOD => info("SMOD", 2, -1, Low, Frontier),
        op::ADDMOD => info("ADDMOD", 3, -2, Mid, Frontier),
        op::MULMOD => info("MULMOD", 3, -2, Mid, Frontier),
        op::EXP => info("EXP", 2, -1, Special, Frontier),
        op::SIGNEXTEND => info("SIGNEXTEND", 2, -1, Low, Frontier),

        op::LT => info("LT", 2, -1, VeryLow, Frontier),
        op::GT => info("GT", 2, -1, VeryLow, Frontier),
        op::SLT => info("SLT", 2, -1, VeryLow, Frontier),
        op::SGT => info("SGT", 2, -1, VeryLow, Frontier),
        op::EQ => info("EQ", 2, -1, VeryLow, Frontier),
        op::ISZERO => info("ISZERO", 1, 0, VeryLow, Frontier),
        op::AND => info("AND", 2, -1, VeryLow, Frontier),
        op::OR => info("OR", 2, -1, VeryLow, Frontier),
        op::XOR => info("XOR", 2, -1, VeryLow, Frontier),
        op::NOT => info("NOT", 1, 0, VeryLow, Frontier),
        op::BYTE => info("BYTE", 2, -1, VeryLow, Frontier),
        op::SHL => info("SHL", 2, -1, VeryLow, Constantinople),
        op::SHR => info("SHR", 2, -1, VeryLow, Constantinople),
        op::SAR => info("SAR", 2, -1, VeryLow, Constantinople),

        op::KECCAK256 => info("KECCAK256", 2, -1, Special, Frontier),

        op::ADDRESS => info("ADDRESS", 0, 1, Base, Frontier),
        op::BALANCE => info("BALANCE", 1, 0, Special, Frontier),
        op::ORIGIN => info("ORIGIN", 0, 1, Base, Frontier),
        op::CALLER => info("CALLER", 0, 1, Base, Frontier),
        op::CALLVALUE => info("CALLVALUE", 0, 1, Base, Frontier),
        op::CALLDATALOAD => info("CALLDATALOAD", 1, 0, VeryLow, Frontier),
        op::CALLDATASIZE => info("CALLDATASIZE", 0, 1, Base, Frontier),
        op::CALLDATACOPY => info("CALLDATACOPY", 3, -3, Special, Frontier),
        op::CODESIZE => info("CODESIZE", 0, 1, Base, Frontier),
        op::CODECOPY => info("CODECOPY", 3, -3, Special, Frontier),
        op::GASPRICE => info("GASPRICE", 0, 1, Base, Frontier),
        op::EXTCODESIZE => info("EXTCODESIZE", 1, 0, Special, Frontier),
        op::EXTCODECOPY => info("EXTCODECOPY", 4, -4, Special, Frontier),
        op::RETURNDATASIZE => info("RETURNDATASIZE", 0, 1, Base, Byzantium),
        op::RETURNDATACOPY => info("RETURNDATACOPY", 3, -3, Special, Byzantium),
        op::EXTCODEHASH => info("EXTCODEHASH", 1, 0, Special, Constantinople),

        op::BLOCKHASH => info("BLOCKHASH", 1, 0, Special, Frontier),
        op::COINBASE => info("COINBASE", 0, 1, Base, Frontier),
        op::TIMESTAMP => info("TIMESTAMP", 0, 1, Base, Frontier),
        op::NUMBER => info("NUMBER", 0, 1, Base, Frontier),
        op::DIFFICULTY => info("DIFFICULTY", 0, 1, Base, Frontier),
        op::GASLIMIT => info("GASLIMIT", 0, 1, Base, Frontier),
        op::CHAINID => info("CHAINID", 0, 1, Base, Istanbul),
        op::SELFBALANCE => info("SELFBALANCE", 0, 1, Low, Istanbul),

        op::POP => info("POP", 1, -1, Base, Frontier),
        op::MLOAD => info("MLOAD", 1, 0, VeryLow, Frontier),
        op::MSTORE => info("MSTORE", 2, -2, VeryLow, Frontier),
        op::MSTORE8 => info("MSTORE8", 2, -2, VeryLow, Frontier),
        op::SLOAD => info("SLOAD", 1, 0, Special, Frontier),
        op::SSTORE => info("SSTORE", 2, -2, Special, Frontier),
        op::JUMP => info("JUMP", 1, -1, Mid, Frontier),
        op::JUMPI => info("JUMPI", 2, -2, High, Frontier),
        op::PC => info("PC", 0, 1, Base, Frontier),
        op::MSIZE => info("MSIZE", 0, 1, Base, Frontier),
        op::GAS => info("GAS", 0, 1, Base, Frontier),
        op::JUMPDEST => info("JUMPDEST", 0, 0, Special, Frontier),

        op::JUMPC => info("JUMPC", 0, -1, Mid, Frontier),
        op::JUMPCI => info("JUMPCI", 1, -2, High, Frontier),
        op::PUSHC => info("PUSHC", 0, 1, VeryLow, Frontier),

        op::CREATE => info("CREATE", 3, -2, Special, Frontier),
        op::CALL => info("CALL", 7, -6, Special, Frontier),
        op::CALLCODE => info("CALLCODE", 7, -6, Special, Frontier),
        op::RETURN => info("RETURN", 2, -2, Special, Frontier),
        op::DELEGATECALL => info("DELEGATECALL", 6, -5, Special, Homestead),
        op::CREATE2 => info("CREATE2", 4, -3, Special, Constantinople),
        op::STATICCALL => info("STATICCALL", 6, -5, Special, Byzantium),
        op::REVERT => info("REVERT", 2, -2, Special, Byzantium),
        op::INVALID => info("INVALID", 0, 0, Zero, Frontier),
        op::SELFDESTRUCT => info("SELFDESTRUCT", 1, -1, Special, Frontier),

        _ => return None,
    })
}

/// Resolves `opcode_info`, additionally requiring the opcode to be enabled
/// under `revision`.
pub fn opcode_info_for_revision(opcode: u8, revision: Revision) -> Option<OpInfo> {
    opcode_info(opcode).filter(|i| revision >= i.since)
}

/// `tier_step_gas` index for a `GasTier`; `Special` has no tier slot.
pub fn tier_index(tier: GasTier) -> Option<usize> {
    use GasTier::*;
    match tier {
        Zero => Some(0),
        Base => Some(1),
        VeryLow => Some(2),
        Low => Some(3),
        Mid => Some(4),
        High => Some(5),
        Special => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shl_is_undefined_before_constantinople() {
        assert!(opcode_info_for_revision(op::SHL, Revision::Byzantium).is_none());
        assert!(opcode_info_for_revision(op::SHL, Revision::Constantinople).is_some());
    }

    #[test]
    fn push_dup_swap_ranges_resolve() {
        assert_eq!(opcode_info(op::PUSH1).unwrap().stack_delta, 1);
        assert_eq!(opcode_info(op::DUP16).unwrap().stack_in, 16);
        assert_eq!(opcode_info(op::SWAP16).unwrap().stack_in, 17);
    }

    #[test]
    fn log_topic_count_matches_opcode() {
        assert_eq!(opcode_info(op::LOG4).unwrap().stack_in, 6);
    }

    #[test]
    fn internal_opcodes_are_flagged() {
        assert!(op::is_internal(op::JUMPC));
        assert!(!op::is_internal(op::JUMP));
    }
}
