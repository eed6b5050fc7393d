//! Exact 256-bit machine words.
//!
//! A [`Word256`] holds an unsigned integer in `0..2^256`. The magnitude is
//! stored in the smallest of three tiers (`u32`, `u64`, [`BigUint`]) so that
//! the overwhelmingly common small constants (offsets, jump destinations,
//! selectors) never touch the heap. Every constructor and operation reduces
//! its result modulo `2^256` and normalizes the tier, so structural equality
//! and hashing coincide with numeric equality.
//!
//! Operations follow EVM conventions: arithmetic wraps, division and modulo
//! by zero yield zero, shifts saturate at 256 bits.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};

use crate::bits::{self, Bytes32, WORD_BITS, WORD_BYTES};
use crate::error::{DomainError, Result};

/// Magnitude tiers.
///
/// Normalization keeps every value in the smallest tier that fits, so the
/// derived ordering (variant first, then payload) is the numeric ordering.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Magnitude {
    Int(u32),
    Long(u64),
    Big(BigUint),
}

/// An unsigned 256-bit word.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Word256(Magnitude);

fn modulus() -> &'static BigUint {
    static MODULUS: OnceLock<BigUint> = OnceLock::new();
    MODULUS.get_or_init(|| BigUint::one() << WORD_BITS)
}

impl Word256 {
    pub fn zero() -> Self {
        Word256(Magnitude::Int(0))
    }

    pub fn one() -> Self {
        Word256(Magnitude::Int(1))
    }

    /// The all-ones word `2^256 - 1`.
    pub fn max_value() -> Self {
        Word256(Magnitude::Big(modulus().clone() - 1u32))
    }

    /// Builds a word from an arbitrary non-negative integer, reducing it modulo `2^256`.
    pub fn from_biguint(value: BigUint) -> Self {
        let value = if value.bits() > WORD_BITS as u64 {
            value % modulus()
        } else {
            value
        };
        match value.to_u64() {
            Some(v) => Self::from(v),
            None => Word256(Magnitude::Big(value)),
        }
    }

    fn from_u128(value: u128) -> Self {
        match u64::try_from(value) {
            Ok(v) => Self::from(v),
            Err(_) => Word256(Magnitude::Big(BigUint::from(value))),
        }
    }

    /// Reconstructs a word from its 32-byte big-endian representation.
    pub fn from_be_bytes(bytes: &Bytes32) -> Self {
        Self::from_biguint(BigUint::from_bytes_be(bytes))
    }

    /// Like [`Word256::from_be_bytes`], but for a slice that must be exactly 32 bytes long.
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self> {
        let array: &Bytes32 = bytes.try_into().map_err(|_| DomainError::InvalidWidth {
            expected: WORD_BYTES,
            found: bytes.len(),
        })?;
        Ok(Self::from_be_bytes(array))
    }

    /// Interprets a push immediate (1 to 32 big-endian bytes, possibly empty for PUSH0).
    pub fn from_immediate(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > WORD_BYTES {
            return Err(DomainError::ImmediateTooLong { len: bytes.len() });
        }
        Ok(Self::from_biguint(BigUint::from_bytes_be(bytes)))
    }

    /// The 32-byte big-endian representation.
    pub fn to_be_bytes(&self) -> Bytes32 {
        let mut out = [0u8; WORD_BYTES];
        match &self.0 {
            Magnitude::Int(v) => out[WORD_BYTES - 4..].copy_from_slice(&v.to_be_bytes()),
            Magnitude::Long(v) => out[WORD_BYTES - 8..].copy_from_slice(&v.to_be_bytes()),
            Magnitude::Big(v) => {
                let raw = v.to_bytes_be();
                out[WORD_BYTES - raw.len()..].copy_from_slice(&raw);
            }
        }
        out
    }

    pub fn to_biguint(&self) -> BigUint {
        match &self.0 {
            Magnitude::Int(v) => BigUint::from(*v),
            Magnitude::Long(v) => BigUint::from(*v),
            Magnitude::Big(v) => v.clone(),
        }
    }

    /// The value as `u64`, if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        match &self.0 {
            Magnitude::Int(v) => Some(*v as u64),
            Magnitude::Long(v) => Some(*v),
            Magnitude::Big(_) => None,
        }
    }

    /// The value as `usize`, if it fits.
    pub fn to_usize(&self) -> Option<usize> {
        self.to_u64().and_then(|v| usize::try_from(v).ok())
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.0, Magnitude::Int(0))
    }

    /// Whether the two's-complement sign bit (bit 255) is set.
    pub fn is_negative(&self) -> bool {
        match &self.0 {
            Magnitude::Big(v) => v.bit(WORD_BITS as u64 - 1),
            _ => false,
        }
    }

    /// Shift amount clamped to `0..=256`.
    fn shift_amount(&self) -> usize {
        match self.to_u64() {
            Some(v) if v < WORD_BITS as u64 => v as usize,
            _ => WORD_BITS,
        }
    }

    pub fn wrapping_add(&self, other: &Self) -> Self {
        match (self.to_u64(), other.to_u64()) {
            (Some(a), Some(b)) => Self::from_u128(a as u128 + b as u128),
            _ => Self::from_biguint(self.to_biguint() + other.to_biguint()),
        }
    }

    pub fn wrapping_sub(&self, other: &Self) -> Self {
        if let (Some(a), Some(b)) = (self.to_u64(), other.to_u64()) {
            if a >= b {
                return Self::from(a - b);
            }
        }
        let a = self.to_biguint();
        let b = other.to_biguint();
        if a >= b {
            Self::from_biguint(a - b)
        } else {
            Self::from_biguint(modulus() - b + a)
        }
    }

    pub fn wrapping_mul(&self, other: &Self) -> Self {
        match (self.to_u64(), other.to_u64()) {
            (Some(a), Some(b)) => Self::from_u128(a as u128 * b as u128),
            _ => Self::from_biguint(self.to_biguint() * other.to_biguint()),
        }
    }

    /// Two's-complement negation.
    pub fn wrapping_neg(&self) -> Self {
        Self::zero().wrapping_sub(self)
    }

    /// Unsigned division; zero divisor yields zero.
    pub fn udiv(&self, other: &Self) -> Self {
        if other.is_zero() {
            return Self::zero();
        }
        match (self.to_u64(), other.to_u64()) {
            (Some(a), Some(b)) => Self::from(a / b),
            _ => Self::from_biguint(self.to_biguint() / other.to_biguint()),
        }
    }

    /// Unsigned remainder; zero divisor yields zero.
    pub fn umod(&self, other: &Self) -> Self {
        if other.is_zero() {
            return Self::zero();
        }
        match (self.to_u64(), other.to_u64()) {
            (Some(a), Some(b)) => Self::from(a % b),
            _ => Self::from_biguint(self.to_biguint() % other.to_biguint()),
        }
    }

    fn abs(&self) -> Self {
        if self.is_negative() {
            self.wrapping_neg()
        } else {
            self.clone()
        }
    }

    /// Signed division, truncating towards zero; zero divisor yields zero.
    ///
    /// `sdiv(-2^255, -1)` overflows back to `-2^255`.
    pub fn sdiv(&self, other: &Self) -> Self {
        if other.is_zero() {
            return Self::zero();
        }
        let quotient = self.abs().udiv(&other.abs());
        if self.is_negative() != other.is_negative() {
            quotient.wrapping_neg()
        } else {
            quotient
        }
    }

    /// Signed remainder, taking the sign of the dividend; zero divisor yields zero.
    pub fn smod(&self, other: &Self) -> Self {
        if other.is_zero() {
            return Self::zero();
        }
        let rem = self.abs().umod(&other.abs());
        if self.is_negative() {
            rem.wrapping_neg()
        } else {
            rem
        }
    }

    /// `(self + other) % modulus` over unbounded intermediates.
    pub fn addmod(&self, other: &Self, modulus: &Self) -> Self {
        if modulus.is_zero() {
            return Self::zero();
        }
        Self::from_biguint((self.to_biguint() + other.to_biguint()) % modulus.to_biguint())
    }

    /// `(self * other) % modulus` over unbounded intermediates.
    pub fn mulmod(&self, other: &Self, modulus: &Self) -> Self {
        if modulus.is_zero() {
            return Self::zero();
        }
        Self::from_biguint((self.to_biguint() * other.to_biguint()) % modulus.to_biguint())
    }

    /// Exponentiation that refuses to wrap.
    ///
    /// Returns `None` as soon as a partial product reaches `2^256`. Bases 0
    /// and 1 are closed under multiplication and never overflow, so any
    /// exponent is accepted for them; for larger bases the exponent is at
    /// most 255 before overflow, which bounds the loop.
    pub fn checked_pow(&self, exponent: &Self) -> Option<Self> {
        if exponent.is_zero() {
            return Some(Self::one());
        }
        match self.to_u64() {
            Some(0) => return Some(Self::zero()),
            Some(1) => return Some(Self::one()),
            _ => {}
        }
        let exponent = exponent.to_u64().filter(|&e| e < WORD_BITS as u64)?;
        let base = self.to_biguint();
        let mut acc = BigUint::one();
        for _ in 0..exponent {
            acc *= &base;
            if acc >= *modulus() {
                return None;
            }
        }
        Some(Self::from_biguint(acc))
    }

    fn bitwise(&self, other: &Self, op_small: fn(u64, u64) -> u64, op_big: fn(&BigUint, &BigUint) -> BigUint) -> Self {
        match (self.to_u64(), other.to_u64()) {
            (Some(a), Some(b)) => Self::from(op_small(a, b)),
            _ => Self::from_biguint(op_big(&self.to_biguint(), &other.to_biguint())),
        }
    }

    pub fn and(&self, other: &Self) -> Self {
        self.bitwise(other, |a, b| a & b, |a, b| a & b)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.bitwise(other, |a, b| a | b, |a, b| a | b)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.bitwise(other, |a, b| a ^ b, |a, b| a ^ b)
    }

    /// Bitwise complement: `2^256 - (v + 1)`.
    pub fn complement(&self) -> Self {
        Self::from_biguint(modulus() - (self.to_biguint() + 1u32))
    }

    /// `self << shift`, zero for shifts of 256 or more.
    pub fn shift_left(&self, shift: &Self) -> Self {
        Self::from_be_bytes(&bits::shl(&self.to_be_bytes(), shift.shift_amount()))
    }

    /// Logical `self >> shift`, zero for shifts of 256 or more.
    pub fn shift_right(&self, shift: &Self) -> Self {
        Self::from_be_bytes(&bits::shr(&self.to_be_bytes(), shift.shift_amount()))
    }

    /// Arithmetic `self >> shift`.
    pub fn sar(&self, shift: &Self) -> Self {
        Self::from_be_bytes(&bits::sar(&self.to_be_bytes(), shift.shift_amount()))
    }

    /// Signed comparison.
    pub fn signed_cmp(&self, other: &Self) -> Ordering {
        match (self.is_negative(), other.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.cmp(other),
        }
    }

    /// Sign-extends `self` from the byte at index `byte` (0 = least significant).
    pub fn signextend(&self, byte: &Self) -> Self {
        let b = match byte.to_u64() {
            Some(b) if b < 31 => b as usize,
            _ => return self.clone(),
        };
        let width = 8 * (b + 1);
        let high_mask = bits::shl(&[0xFF; WORD_BYTES], width);
        let mut out = self.to_be_bytes();
        let negative = out[WORD_BYTES - 1 - b] & 0x80 != 0;
        for (x, m) in out.iter_mut().zip(high_mask.iter()) {
            if negative {
                *x |= m;
            } else {
                *x &= !m;
            }
        }
        Self::from_be_bytes(&out)
    }

    /// The `index`-th byte counting from the most significant, zero past the end.
    pub fn byte(&self, index: &Self) -> Self {
        match index.to_usize() {
            Some(i) if i < WORD_BYTES => Self::from(self.to_be_bytes()[i] as u64),
            _ => Self::zero(),
        }
    }
}

impl From<u64> for Word256 {
    fn from(value: u64) -> Self {
        match u32::try_from(value) {
            Ok(v) => Word256(Magnitude::Int(v)),
            Err(_) => Word256(Magnitude::Long(value)),
        }
    }
}

impl From<u32> for Word256 {
    fn from(value: u32) -> Self {
        Word256(Magnitude::Int(value))
    }
}

impl From<usize> for Word256 {
    fn from(value: usize) -> Self {
        Self::from(value as u64)
    }
}

impl From<bool> for Word256 {
    fn from(value: bool) -> Self {
        Word256(Magnitude::Int(value as u32))
    }
}

impl From<BigUint> for Word256 {
    fn from(value: BigUint) -> Self {
        Self::from_biguint(value)
    }
}

impl fmt::Display for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Magnitude::Int(v) => write!(f, "{}", v),
            Magnitude::Long(v) => write!(f, "{}", v),
            Magnitude::Big(v) => write!(f, "0x{:x}", v),
        }
    }
}

impl fmt::Debug for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word256({})", self)
    }
}

impl fmt::LowerHex for Word256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.to_biguint(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn w(v: u64) -> Word256 {
        Word256::from(v)
    }

    fn minus(v: u64) -> Word256 {
        w(v).wrapping_neg()
    }

    #[test]
    fn test_tiers_normalize() {
        assert_eq!(w(5), Word256::from_biguint(BigUint::from(5u32)));
        assert_eq!(w(u64::MAX), Word256::from_biguint(BigUint::from(u64::MAX)));
        let big = Word256::from_biguint(BigUint::from(u64::MAX) + 1u32);
        assert_eq!(big.to_u64(), None);
        assert_eq!(big.wrapping_sub(&w(1)), w(u64::MAX));
        assert_eq!(big.wrapping_sub(&w(1)).to_u64(), Some(u64::MAX));
    }

    #[test]
    fn test_ordering_across_tiers() {
        let big = Word256::max_value();
        assert!(w(3) < w(1 << 40));
        assert!(w(1 << 40) < big);
        assert!(w(0) < w(1));
    }

    #[test]
    fn test_reduction_modulo() {
        let m: BigUint = BigUint::one() << 256usize;
        assert_eq!(Word256::from_biguint(m.clone()), Word256::zero());
        assert_eq!(Word256::from_biguint(m + 7u32), w(7));
    }

    #[test]
    fn test_wraparound() {
        for v in [1u64, 2, 12345, u64::MAX] {
            let v = w(v);
            let complement = Word256::from_biguint(modulus() - v.to_biguint());
            assert_eq!(v.wrapping_add(&complement), Word256::zero());
        }
        assert_eq!(Word256::max_value().wrapping_add(&w(1)), Word256::zero());
        assert_eq!(w(0).wrapping_sub(&w(1)), Word256::max_value());
    }

    #[test]
    fn test_mul() {
        assert_eq!(w(6).wrapping_mul(&w(7)), w(42));
        let x = Word256::from_biguint(BigUint::one() << 255usize);
        assert_eq!(x.wrapping_mul(&w(2)), Word256::zero());
        assert_eq!(w(u64::MAX).wrapping_mul(&w(u64::MAX)).to_biguint(), BigUint::from(u64::MAX) * u64::MAX);
    }

    #[test]
    fn test_division_by_zero() {
        for v in [0u64, 1, 99] {
            assert_eq!(w(v).udiv(&Word256::zero()), Word256::zero());
            assert_eq!(w(v).umod(&Word256::zero()), Word256::zero());
            assert_eq!(w(v).sdiv(&Word256::zero()), Word256::zero());
            assert_eq!(w(v).smod(&Word256::zero()), Word256::zero());
            assert_eq!(w(v).addmod(&w(1), &Word256::zero()), Word256::zero());
        }
        assert_eq!(w(17).udiv(&w(5)), w(3));
        assert_eq!(w(17).umod(&w(5)), w(2));
    }

    #[test]
    fn test_signed_division() {
        assert_eq!(minus(10).sdiv(&w(3)), minus(3));
        assert_eq!(w(10).sdiv(&minus(3)), minus(3));
        assert_eq!(minus(10).sdiv(&minus(3)), w(3));
        assert_eq!(minus(10).smod(&w(3)), minus(1));
        assert_eq!(w(10).smod(&minus(3)), w(1));

        let min = Word256::from_biguint(BigUint::one() << 255usize);
        assert_eq!(min.sdiv(&minus(1)), min);
    }

    #[test]
    fn test_addmod_mulmod_unbounded() {
        let max = Word256::max_value();
        // (2^256 - 1) + 2 = 2^256 + 1, and (2^256 + 1) mod 10 = 7
        assert_eq!(max.addmod(&w(2), &w(10)), w(7));
        // (2^256 - 1)^2 mod 7, computed without wrapping
        let expected = (max.to_biguint() * max.to_biguint()) % 7u32;
        assert_eq!(max.mulmod(&max, &w(7)), Word256::from_biguint(expected));
    }

    #[test]
    fn test_checked_pow() {
        assert_eq!(w(2).checked_pow(&w(10)), Some(w(1024)));
        assert_eq!(w(7).checked_pow(&w(0)), Some(w(1)));
        assert_eq!(w(0).checked_pow(&Word256::max_value()), Some(w(0)));
        assert_eq!(w(1).checked_pow(&Word256::max_value()), Some(w(1)));
        assert_eq!(w(2).checked_pow(&w(255)).map(|v| v.to_biguint()), Some(BigUint::one() << 255usize));
        assert_eq!(w(2).checked_pow(&w(256)), None);
        assert_eq!(w(3).checked_pow(&Word256::max_value()), None);
    }

    #[test]
    fn test_complement() {
        assert_eq!(w(0).complement(), Word256::max_value());
        assert_eq!(Word256::max_value().complement(), w(0));
        assert_eq!(w(5).complement().wrapping_add(&w(5)), Word256::max_value());
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(w(0b1100).and(&w(0b1010)), w(0b1000));
        assert_eq!(w(0b1100).or(&w(0b1010)), w(0b1110));
        assert_eq!(w(0b1100).xor(&w(0b1010)), w(0b0110));
        assert_eq!(Word256::max_value().and(&w(0xFF)), w(0xFF));
        assert_eq!(Word256::max_value().xor(&Word256::max_value()), w(0));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(w(1).shift_left(&w(1)), w(2));
        assert_eq!(w(2).shift_right(&w(1)), w(1));
        assert_eq!(w(1).shift_left(&w(256)), w(0));
        assert_eq!(w(1).shift_left(&Word256::max_value()), w(0));
        assert_eq!(w(1).shift_left(&w(255)).to_biguint(), BigUint::one() << 255usize);
        assert_eq!(minus(16).sar(&w(2)), minus(4));
        assert_eq!(minus(1).sar(&w(300)), Word256::max_value());
        assert_eq!(w(16).sar(&w(300)), w(0));
    }

    #[test]
    fn test_signed_compare() {
        assert_eq!(minus(1).signed_cmp(&w(0)), Ordering::Less);
        assert_eq!(w(0).signed_cmp(&minus(1)), Ordering::Greater);
        assert_eq!(minus(5).signed_cmp(&minus(3)), Ordering::Less);
        assert_eq!(w(5).signed_cmp(&w(5)), Ordering::Equal);
    }

    #[test]
    fn test_signextend() {
        assert_eq!(w(0xFF).signextend(&w(0)), Word256::max_value());
        assert_eq!(w(0x7F).signextend(&w(0)), w(0x7F));
        assert_eq!(w(0x1FF).signextend(&w(0)), Word256::max_value());
        assert_eq!(w(0x8000).signextend(&w(1)), minus(0x8000));
        assert_eq!(w(0xABCD).signextend(&w(31)), w(0xABCD));
        assert_eq!(w(0xABCD).signextend(&Word256::max_value()), w(0xABCD));
    }

    #[test]
    fn test_byte() {
        let v = w(0x1122);
        assert_eq!(v.byte(&w(31)), w(0x22));
        assert_eq!(v.byte(&w(30)), w(0x11));
        assert_eq!(v.byte(&w(0)), w(0));
        assert_eq!(v.byte(&w(32)), w(0));
    }

    #[test]
    fn test_bytes_round_trip_and_width() {
        let v = Word256::max_value().wrapping_sub(&w(41));
        assert_eq!(Word256::from_be_bytes(&v.to_be_bytes()), v);

        assert!(Word256::from_be_slice(&[0u8; 32]).is_ok());
        assert_eq!(
            Word256::from_be_slice(&[0u8; 31]),
            Err(DomainError::InvalidWidth { expected: 32, found: 31 })
        );
    }

    #[test]
    fn test_immediate() {
        assert_eq!(Word256::from_immediate(&[]), Ok(w(0)));
        assert_eq!(Word256::from_immediate(&[0x01, 0x00]), Ok(w(256)));
        assert_eq!(
            Word256::from_immediate(&[0u8; 33]),
            Err(DomainError::ImmediateTooLong { len: 33 })
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(w(42).to_string(), "42");
        assert_eq!(Word256::max_value().to_string(), format!("0x{}", "f".repeat(64)));
        assert_eq!(format!("{:x}", w(255)), "ff");
    }
}
