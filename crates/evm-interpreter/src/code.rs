//! One-time code preprocessing (C6).
//!
//! Pass 1 builds the sorted jump-destination table and pads the code buffer
//! with 32 zero bytes so a truncated trailing `PUSH32` reads zeros without a
//! bounds check. Pass 2 is an optional, semantically transparent local
//! optimization that fuses `PUSH32`-then-`JUMP(I)` pairs into the internal
//! `JUMPC`/`JUMPCI` opcodes and interns large `PUSH` constants into a
//! per-contract pool behind `PUSHC`.

use std::collections::{BTreeMap, BTreeSet};

use evm_primitives::Word;

use crate::opcode::op;

/// Number of zero bytes appended past the end of user code so a truncated
/// `PUSH32` can always read 32 bytes without a bounds check.
const CODE_PADDING: usize = 32;

#[derive(Debug, Clone)]
pub struct Code {
    /// User bytecode followed by `CODE_PADDING` zero bytes. Pass 2 rewrites
    /// happen in place, so `buf[pc]` after preprocessing may differ from
    /// the original submitted bytecode.
    buf: Vec<u8>,
    /// Length of the bytecode as submitted by the caller (excludes padding
    /// and is never touched by pass 2, since rewrites are same-length).
    original_len: usize,
    jump_destinations: BTreeSet<usize>,
    /// Offsets pass 2 rewrote into `JUMPC`/`JUMPCI`/`PUSHC`. Any other
    /// occurrence of those three byte values was present in the *submitted*
    /// bytecode and must fail with `BadInstruction` (they are unforgeable).
    rewritten_offsets: BTreeSet<usize>,
    /// Constant pool for `PUSHC`, populated by pass 2.
    constant_pool: Vec<Word>,
    /// `PUSHC` offset -> original `PUSHn` instruction width (`1 + n`), since
    /// `PUSHC` keeps the original instruction's footprint (padded with
    /// filler bytes) rather than shrinking it, and the dispatch loop needs
    /// the real width to advance `pc` correctly.
    pushc_width: BTreeMap<usize, usize>,
}

impl Code {
    /// Runs pass 1 (always) and, if `optimize` is set, pass 2.
    pub fn new(bytecode: &[u8], optimize: bool) -> Code {
        let mut buf = bytecode.to_vec();
        buf.extend(std::iter::repeat_n(0u8, CODE_PADDING));

        let jump_destinations = Self::scan_jump_destinations(bytecode);

        let mut code = Code {
            buf,
            original_len: bytecode.len(),
            jump_destinations,
            rewritten_offsets: BTreeSet::new(),
            constant_pool: Vec::new(),
            pushc_width: BTreeMap::new(),
        };
        if optimize {
            code.fuse_push_jump_pairs();
            code.intern_large_push_constants();
        }
        code
    }

    fn scan_jump_destinations(bytecode: &[u8]) -> BTreeSet<usize> {
        let mut set = BTreeSet::new();
        let mut pc = 0usize;
        while pc < bytecode.len() {
            let opcode = bytecode[pc];
            if opcode == op::JUMPDEST {
                set.insert(pc);
                pc += 1;
            } else if op::is_push(opcode) {
                pc += 1 + op::push_len(opcode) as usize;
            } else {
                pc += 1;
            }
        }
        set
    }

    /// Pass 2a: a `PUSH32 <dest>` immediately followed by `JUMP`/`JUMPI`,
    /// where `<dest>` is a valid jump destination, is rewritten to
    /// `JUMPC`/`JUMPCI` carrying the same immediate bytes — the runtime
    /// validity check is then skippable because validity was proven here.
    fn fuse_push_jump_pairs(&mut self) {
        let mut pc = 0usize;
        while pc < self.original_len {
            let opcode = self.buf[pc];
            if opcode == op::PUSH32 && pc + 33 <= self.original_len {
                let dest_bytes: [u8; 32] = self.buf[pc + 1..pc + 33].try_into().unwrap();
                let dest = Word::from_be_bytes(dest_bytes);
                let follow = self.buf[pc + 33];
                let is_valid_dest = dest < Word::from(usize::MAX)
                    && self.jump_destinations.contains(&(dest.as_limbs()[0] as usize));
                if is_valid_dest && (follow == op::JUMP || follow == op::JUMPI) {
                    let fused = if follow == op::JUMP {
                        op::JUMPC
                    } else {
                        op::JUMPCI
                    };
                    self.buf[pc] = fused;
                    self.buf[pc + 33] = op::JUMPDEST; // no-op filler, never reached as an opcode
                    self.rewritten_offsets.insert(pc);
                    pc += 34;
                    continue;
                }
                pc += 33;
                continue;
            }
            if op::is_push(opcode) {
                pc += 1 + op::push_len(opcode) as usize;
            } else {
                pc += 1;
            }
        }
    }

    /// Pass 2b: any remaining `PUSHn` (n > 8) immediate is moved to the
    /// constant pool and replaced with `PUSHC <pool_index>` (a 1-byte
    /// immediate), purely to shrink the hot working set of the dispatch
    /// loop.
    fn intern_large_push_constants(&mut self) {
        let mut pc = 0usize;
        while pc < self.original_len {
            let opcode = self.buf[pc];
            if op::is_push(opcode) && !self.rewritten_offsets.contains(&pc) {
                let len = op::push_len(opcode) as usize;
                if len > 8 && pc + 1 + len <= self.original_len {
                    let mut bytes = [0u8; 32];
                    bytes[32 - len..].copy_from_slice(&self.buf[pc + 1..pc + 1 + len]);
                    let value = Word::from_be_bytes(bytes);
                    let index = self.constant_pool.len();
                    self.constant_pool.push(value);
                    self.buf[pc] = op::PUSHC;
                    self.buf[pc + 1] = index as u8;
                    for slot in &mut self.buf[pc + 2..pc + 1 + len] {
                        *slot = op::JUMPDEST;
                    }
                    self.rewritten_offsets.insert(pc);
                    self.pushc_width.insert(pc, 1 + len);
                }
                pc += 1 + len;
            } else if op::is_push(opcode) {
                pc += 1 + op::push_len(opcode) as usize;
            } else {
                pc += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.original_len
    }

    pub fn is_empty(&self) -> bool {
        self.original_len == 0
    }

    /// Raw (possibly pass-2-rewritten) byte at `pc`; reads past the end of
    /// user code return the zero padding.
    pub fn byte_at(&self, pc: usize) -> u8 {
        self.buf[pc]
    }

    /// A fixed 32-byte immediate starting at `pc`, padded with zero past
    /// `original_len` — used by `PUSHn`/`JUMPC`/`JUMPCI` decoding.
    pub fn immediate32(&self, pc: usize) -> [u8; 32] {
        self.buf[pc..pc + 32].try_into().unwrap()
    }

    pub fn jump_destination_is_valid(&self, dest: usize) -> bool {
        self.jump_destinations.contains(&dest)
    }

    /// Whether the byte at `pc` is one of `JUMPC`/`JUMPCI`/`PUSHC` *and* it
    /// was produced by this code's own pass 2, as opposed to having been
    /// present verbatim in the submitted bytecode.
    pub fn is_legitimate_internal_opcode(&self, pc: usize) -> bool {
        self.rewritten_offsets.contains(&pc)
    }

    pub fn constant(&self, index: u8) -> Word {
        self.constant_pool[index as usize]
    }

    /// Total instruction width of the `PUSHC` at `pc` (`1` for the opcode
    /// byte plus the original `PUSHn`'s immediate length).
    pub fn pushc_width(&self, pc: usize) -> usize {
        self.pushc_width[&pc]
    }

    pub fn original_bytes(&self) -> &[u8] {
        &self.buf[..self.original_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jumpdest_prepass_matches_runtime_scan() {
        // PUSH1 0x03, JUMP, JUMPDEST, STOP -- JUMPDEST at offset 3.
        let bytecode = [0x60, 0x03, 0x56, 0x5b, 0x00];
        let code = Code::new(&bytecode, false);
        assert!(code.jump_destination_is_valid(3));
        assert!(!code.jump_destination_is_valid(2));
    }

    #[test]
    fn jumpdest_inside_push_immediate_is_not_a_destination() {
        // PUSH1 0x5b -- the 0x5b is immediate data, not JUMPDEST.
        let bytecode = [0x60, 0x5b];
        let code = Code::new(&bytecode, false);
        assert!(!code.jump_destination_is_valid(1));
    }

    #[test]
    fn padding_reads_as_zero_past_end() {
        let bytecode = [0x7f]; // PUSH32 with no immediate bytes at all
        let code = Code::new(&bytecode, false);
        assert_eq!(code.immediate32(1), [0u8; 32]);
    }

    #[test]
    fn pass2_fuses_push32_jump_into_jumpc() {
        let mut bytecode = vec![0x7f];
        bytecode.extend_from_slice(&[0u8; 31]);
        bytecode.push(34); // destination offset (the JUMPDEST below)
        bytecode.push(op::JUMP);
        bytecode.push(op::JUMPDEST);
        let code = Code::new(&bytecode, true);
        assert_eq!(code.byte_at(0), op::JUMPC);
        assert!(code.is_legitimate_internal_opcode(0));
    }

    #[test]
    fn forged_internal_opcode_is_not_legitimate() {
        let bytecode = [op::JUMPC];
        let code = Code::new(&bytecode, true);
        assert!(!code.is_legitimate_internal_opcode(0));
    }
}
