//! Exact mod-2^256 word arithmetic (C1).
//!
//! `Word` arithmetic is unsigned modular by default (`alloy_primitives::U256`
//! already wraps on add/sub/mul); this module supplies the signed variants
//! and the handful of operations EVM opcodes need that have no direct
//! standard-library equivalent: `sdiv`, `smod`, `exp`, `byte`, `signextend`,
//! `shl`/`shr`/`sar`, and signed comparison.
//!
//! Division-by-zero never traps (`udiv`/`umod`/`sdiv`/`smod` all return 0),
//! matching `libevm/VM.cpp`'s `divWorkaround`/`modWorkaround` guards.

use crate::Word;

const SIGN_BIT: u32 = 255;

/// Two's-complement sign bit test.
fn is_negative(w: &Word) -> bool {
    w.bit(SIGN_BIT as usize)
}

/// `u2s`: reinterpret the bit pattern of `w` as a signed value, returned as
/// `(magnitude_as_unsigned_word, is_negative)` so callers can recombine
/// without a wider integer type.
fn to_signed_magnitude(w: Word) -> (Word, bool) {
    if is_negative(&w) {
        (w.wrapping_neg(), true)
    } else {
        (w, false)
    }
}

fn from_signed_magnitude(magnitude: Word, negative: bool) -> Word {
    if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    }
}

/// `MIN_SIGNED = -2^255`, the bit pattern `0x80 00..00`.
pub fn min_signed() -> Word {
    Word::from(1) << 255
}

/// Unsigned division; `udiv(x, 0) = 0`.
pub fn udiv(x: Word, y: Word) -> Word {
    if y.is_zero() {
        Word::ZERO
    } else {
        x / y
    }
}

/// Unsigned remainder; `umod(x, 0) = 0`.
pub fn umod(x: Word, y: Word) -> Word {
    if y.is_zero() {
        Word::ZERO
    } else {
        x % y
    }
}

/// Signed division; `sdiv(x, 0) = 0`; `sdiv(MIN_SIGNED, -1) = MIN_SIGNED`
/// (the two's-complement overflow saturates rather than traps).
pub fn sdiv(x: Word, y: Word) -> Word {
    if y.is_zero() {
        return Word::ZERO;
    }
    let neg_one = Word::MAX;
    if x == min_signed() && y == neg_one {
        return min_signed();
    }
    let (xm, xneg) = to_signed_magnitude(x);
    let (ym, yneg) = to_signed_magnitude(y);
    let q = xm / ym;
    from_signed_magnitude(q, xneg != yneg)
}

/// Signed remainder; `smod(x, 0) = 0`. Result takes the sign of the dividend.
pub fn smod(x: Word, y: Word) -> Word {
    if y.is_zero() {
        return Word::ZERO;
    }
    let (xm, xneg) = to_signed_magnitude(x);
    let (ym, _) = to_signed_magnitude(y);
    let r = xm % ym;
    from_signed_magnitude(r, xneg)
}

/// `addmod(x, y, m)`; returns 0 when `m == 0`. Performed with 512-bit
/// intermediate precision so the sum cannot overflow before reduction.
pub fn addmod(x: Word, y: Word, m: Word) -> Word {
    if m.is_zero() {
        return Word::ZERO;
    }
    let wide = widen(x) + widen(y);
    narrow_mod(wide, m)
}

/// `mulmod(x, y, m)`; returns 0 when `m == 0`. The product is computed at
/// 512-bit precision before reducing modulo `m`.
pub fn mulmod(x: Word, y: Word, m: Word) -> Word {
    if m.is_zero() {
        return Word::ZERO;
    }
    let wide = widen(x) * widen(y);
    narrow_mod(wide, m)
}

/// `exp(b, e)` by right-to-left square-and-multiply, mod 2^256.
/// `exp(x, 0) == 1` for all `x`, including `exp(0, 0) == 1`.
pub fn exp(mut base: Word, mut exponent: Word) -> Word {
    let mut result = Word::from(1);
    while !exponent.is_zero() {
        if exponent & Word::from(1) == Word::from(1) {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exponent >>= 1;
    }
    result
}

/// Number of bytes needed to big-endian encode the exponent of `EXP`,
/// used by the gas schedule's per-exponent-byte surcharge.
pub fn exp_byte_len(exponent: &Word) -> u64 {
    let bytes = exponent.to_be_bytes::<32>();
    let leading_zero_bytes = bytes.iter().take_while(|b| **b == 0).count();
    (32 - leading_zero_bytes) as u64
}

/// `byte(i, w)`: the `i`-th big-endian byte of `w`, or 0 when `i >= 32`.
pub fn byte(index: Word, w: Word) -> Word {
    if index >= Word::from(32) {
        return Word::ZERO;
    }
    let idx = index.as_limbs()[0] as usize;
    let bytes = w.to_be_bytes::<32>();
    Word::from(bytes[idx])
}

/// Sign-extends the low `8*(k+1)` bits of `w`; identity when `k >= 31`.
pub fn signextend(k: Word, w: Word) -> Word {
    if k >= Word::from(31) {
        return w;
    }
    let k = k.as_limbs()[0] as usize;
    let bit_index = 8 * k + 7;
    let sign_set = w.bit(bit_index);
    let mut bytes = w.to_be_bytes::<32>();
    let fill = if sign_set { 0xffu8 } else { 0x00u8 };
    for byte_slot in bytes.iter_mut().take(31 - k) {
        *byte_slot = fill;
    }
    Word::from_be_bytes(bytes)
}

/// Left shift; a shift amount `>= 256` yields 0.
pub fn shl(shift: Word, value: Word) -> Word {
    if shift >= Word::from(256) {
        Word::ZERO
    } else {
        value << shift.as_limbs()[0] as usize
    }
}

/// Logical right shift; a shift amount `>= 256` yields 0.
pub fn shr(shift: Word, value: Word) -> Word {
    if shift >= Word::from(256) {
        Word::ZERO
    } else {
        value >> shift.as_limbs()[0] as usize
    }
}

/// Arithmetic (sign-preserving) right shift; a shift amount `>= 256` yields
/// 0, or all-ones when `value` is negative.
pub fn sar(shift: Word, value: Word) -> Word {
    let negative = is_negative(&value);
    if shift >= Word::from(256) {
        return if negative { Word::MAX } else { Word::ZERO };
    }
    let n = shift.as_limbs()[0] as usize;
    if !negative {
        return value >> n;
    }
    // Fill the vacated high bits with ones by OR-ing in a shifted mask.
    let shifted = value >> n;
    let mask = if n == 0 {
        Word::ZERO
    } else {
        Word::MAX << (256 - n)
    };
    shifted | mask
}

/// Signed less-than.
pub fn slt(x: Word, y: Word) -> bool {
    let x_neg = is_negative(&x);
    let y_neg = is_negative(&y);
    match (x_neg, y_neg) {
        (true, false) => true,
        (false, true) => false,
        _ => x < y,
    }
}

/// Signed greater-than.
pub fn sgt(x: Word, y: Word) -> bool {
    slt(y, x)
}

/// A 512-bit accumulator used only to compute `addmod`/`mulmod` without
/// intermediate overflow; represented as a pair of `Word` limbs (high, low).
#[derive(Clone, Copy)]
struct Wide {
    high: Word,
    low: Word,
}

fn widen(x: Word) -> Wide {
    Wide {
        high: Word::ZERO,
        low: x,
    }
}

impl core::ops::Add for Wide {
    type Output = Wide;
    fn add(self, rhs: Wide) -> Wide {
        let (low, carry) = self.low.overflowing_add(rhs.low);
        let mut high = self.high + rhs.high;
        if carry {
            high += Word::from(1);
        }
        Wide { high, low }
    }
}

impl core::ops::Mul for Wide {
    type Output = Wide;
    fn mul(self, rhs: Wide) -> Wide {
        // Only `low * low` is non-zero for our call sites (both operands are
        // plain `Word`s widened via `widen`), computed via 128-bit limb
        // cross-products to avoid overflowing the underlying U256 storage.
        let a = self.low;
        let b = rhs.low;
        let a_hi = a >> 128;
        let a_lo = a & ((Word::from(1) << 128) - Word::from(1));
        let b_hi = b >> 128;
        let b_lo = b & ((Word::from(1) << 128) - Word::from(1));

        let lo_lo: Word = a_lo * b_lo;
        let hi_lo = a_hi * b_lo;
        let lo_hi = a_lo * b_hi;
        let hi_hi = a_hi * b_hi;

        let mid = hi_lo + lo_hi;
        let mut high = hi_hi + (mid >> 128);
        let (low, carry) = lo_lo.overflowing_add(mid << 128);
        if carry {
            high += Word::from(1);
        }
        Wide { high, low }
    }
}

/// Reduces a 512-bit accumulator modulo `m` (`m != 0`) using long division
/// one bit at a time; simple and branch-free enough for a cold path like
/// `addmod`/`mulmod`.
fn narrow_mod(value: Wide, m: Word) -> Word {
    let mut remainder = Word::ZERO;
    for limb in [value.high, value.low] {
        for i in (0..256).rev() {
            remainder = (remainder << 1) | Word::from(limb.bit(i) as u8);
            if remainder >= m {
                remainder -= m;
            }
        }
    }
    remainder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_by_zero_does_not_trap() {
        assert_eq!(udiv(Word::from(5), Word::ZERO), Word::ZERO);
        assert_eq!(umod(Word::from(5), Word::ZERO), Word::ZERO);
        assert_eq!(sdiv(Word::from(5), Word::ZERO), Word::ZERO);
        assert_eq!(smod(Word::from(5), Word::ZERO), Word::ZERO);
    }

    #[test]
    fn sdiv_min_signed_by_minus_one_saturates() {
        let min = min_signed();
        let neg_one = Word::MAX;
        assert_eq!(sdiv(min, neg_one), min);
    }

    #[test]
    fn exp_boundary_cases() {
        assert_eq!(exp(Word::from(5), Word::ZERO), Word::from(1));
        assert_eq!(exp(Word::ZERO, Word::ZERO), Word::from(1));
        assert_eq!(exp(Word::from(2), Word::from(10)), Word::from(1024));
    }

    #[test]
    fn signextend_identity_beyond_31() {
        let w = Word::from(0x80);
        assert_eq!(signextend(Word::from(31), w), w);
        assert_eq!(signextend(Word::from(200), w), w);
    }

    #[test]
    fn signextend_sign_extends_negative_byte() {
        // k = 0: treat byte 0 (0x80) as a signed i8 => extend with 0xff.
        let w = Word::from(0x80u64);
        let extended = signextend(Word::ZERO, w);
        assert_eq!(extended, Word::MAX - Word::from(0x7f));
    }

    #[test]
    fn shift_by_256_or_more_yields_zero_or_all_ones() {
        let v = Word::from(1);
        assert_eq!(shl(Word::from(256), v), Word::ZERO);
        assert_eq!(shr(Word::from(256), v), Word::ZERO);
        assert_eq!(sar(Word::from(256), v), Word::ZERO);
        assert_eq!(sar(Word::from(256), min_signed()), Word::MAX);
    }

    #[test]
    fn byte_out_of_range_is_zero() {
        assert_eq!(byte(Word::from(32), Word::from(0xff)), Word::ZERO);
        assert_eq!(byte(Word::from(31), Word::from(0xff)), Word::from(0xff));
    }

    #[test]
    fn mulmod_uses_wide_intermediate() {
        let max = Word::MAX;
        // max * max mod max+1-ish value; just check it doesn't panic and is < m.
        let m = Word::from(97u64);
        let r = mulmod(max, max, m);
        assert!(r < m);
    }

    #[test]
    fn addmod_mod_zero_is_zero() {
        assert_eq!(addmod(Word::from(1), Word::from(2), Word::ZERO), Word::ZERO);
        assert_eq!(mulmod(Word::from(1), Word::from(2), Word::ZERO), Word::ZERO);
    }

    #[test]
    fn signed_comparisons() {
        let neg = min_signed();
        let pos = Word::from(1);
        assert!(slt(neg, pos));
        assert!(!slt(pos, neg));
        assert!(sgt(pos, neg));
    }
}
