//! Single-value abstraction of a machine word.
//!
//! # Elements
//!
//! - ⊥ (`Bottom`): no value, the program point is unreachable
//! - `Concrete(w)`: exactly the word `w`
//! - `TopNotJumpTarget`: unknown, but provably never a resolvable jump target
//! - ⊤ (`Top`): unknown
//!
//! # Lattice Structure
//!
//! ```text
//!              ⊤ (Top)
//!              |
//!       ⊤nj (TopNotJumpTarget)
//!          / |  \
//!   ... Concrete(w) ...
//!          \ |  /
//!              ⊥ (Bottom)
//! ```
//!
//! Two distinct concrete values join to `TopNotJumpTarget`. The lattice has
//! finite height, so widening is join.
//!
//! # Operations
//!
//! Arithmetic follows the EVM: wrapping modulo `2^256`, division by zero is
//! zero. `Bottom` absorbs every operation. An unknown operand makes the
//! result unknown (`Top` if any operand is `Top`, else `TopNotJumpTarget`)
//! except where a known operand decides the result on its own, e.g. `x * 0`.
//! Comparisons involving an unknown operand give `TopNotJumpTarget`, since a
//! boolean is never a meaningful jump destination.

use std::fmt;

use crate::lattice::Lattice;
use crate::word::Word256;

/// An abstract machine word.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArithmeticWord {
    Bottom,
    Concrete(Word256),
    TopNotJumpTarget,
    Top,
}

use ArithmeticWord::*;

impl Default for ArithmeticWord {
    fn default() -> Self {
        Top
    }
}

impl From<Word256> for ArithmeticWord {
    fn from(value: Word256) -> Self {
        Concrete(value)
    }
}

impl From<u64> for ArithmeticWord {
    fn from(value: u64) -> Self {
        Concrete(Word256::from(value))
    }
}

impl From<bool> for ArithmeticWord {
    fn from(value: bool) -> Self {
        Concrete(Word256::from(value))
    }
}

impl ArithmeticWord {
    pub fn zero() -> Self {
        Concrete(Word256::zero())
    }

    pub fn one() -> Self {
        Concrete(Word256::one())
    }

    pub fn as_concrete(&self) -> Option<&Word256> {
        match self {
            Concrete(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, Concrete(_))
    }

    fn is_concrete_zero(&self) -> bool {
        matches!(self, Concrete(w) if w.is_zero())
    }

    /// Known to be non-zero: a taken branch condition.
    pub fn is_definitely_true(&self) -> bool {
        matches!(self, Concrete(w) if !w.is_zero())
    }

    /// Known to be zero: a fall-through branch condition.
    pub fn is_definitely_false(&self) -> bool {
        self.is_concrete_zero()
    }

    /// Whether this value could still resolve to a jump destination.
    pub fn may_be_jump_target(&self) -> bool {
        matches!(self, Concrete(_) | Top)
    }

    /// Result for a non-concrete, non-bottom combination of operands.
    fn unknown_of(operands: &[&Self]) -> Self {
        if operands.iter().any(|op| matches!(op, Top)) {
            Top
        } else {
            TopNotJumpTarget
        }
    }

    fn lift1(&self, f: impl FnOnce(&Word256) -> Word256) -> Self {
        match self {
            Concrete(a) => Concrete(f(a)),
            other => other.clone(),
        }
    }

    fn lift2(&self, other: &Self, f: impl FnOnce(&Word256, &Word256) -> Word256) -> Self {
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (Concrete(a), Concrete(b)) => Concrete(f(a, b)),
            _ => Self::unknown_of(&[self, other]),
        }
    }

    fn lift3(&self, b: &Self, c: &Self, f: impl FnOnce(&Word256, &Word256, &Word256) -> Word256) -> Self {
        match (self, b, c) {
            (Bottom, _, _) | (_, Bottom, _) | (_, _, Bottom) => Bottom,
            (Concrete(x), Concrete(y), Concrete(z)) => Concrete(f(x, y, z)),
            _ => Self::unknown_of(&[self, b, c]),
        }
    }

    fn compare(&self, other: &Self, f: impl FnOnce(&Word256, &Word256) -> bool) -> Self {
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (Concrete(a), Concrete(b)) => Self::from(f(a, b)),
            _ => TopNotJumpTarget,
        }
    }

    /// Either operand is a known zero and neither is bottom.
    fn any_zero(&self, other: &Self) -> bool {
        !self.is_bottom() && !other.is_bottom() && (self.is_concrete_zero() || other.is_concrete_zero())
    }

    pub fn add(&self, other: &Self) -> Self {
        self.lift2(other, Word256::wrapping_add)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.lift2(other, Word256::wrapping_sub)
    }

    pub fn mul(&self, other: &Self) -> Self {
        if self.any_zero(other) {
            return Self::zero();
        }
        self.lift2(other, Word256::wrapping_mul)
    }

    /// Unsigned division of `self` by `other`.
    pub fn div(&self, other: &Self) -> Self {
        if self.any_zero(other) {
            return Self::zero();
        }
        self.lift2(other, Word256::udiv)
    }

    /// Unsigned remainder of `self` modulo `other`.
    pub fn rem(&self, other: &Self) -> Self {
        if self.any_zero(other) {
            return Self::zero();
        }
        self.lift2(other, Word256::umod)
    }

    pub fn sdiv(&self, other: &Self) -> Self {
        if self.any_zero(other) {
            return Self::zero();
        }
        self.lift2(other, Word256::sdiv)
    }

    pub fn smod(&self, other: &Self) -> Self {
        if self.any_zero(other) {
            return Self::zero();
        }
        self.lift2(other, Word256::smod)
    }

    pub fn addmod(&self, other: &Self, modulus: &Self) -> Self {
        if !self.is_bottom() && !other.is_bottom() && modulus.is_concrete_zero() {
            return Self::zero();
        }
        self.lift3(other, modulus, Word256::addmod)
    }

    pub fn mulmod(&self, other: &Self, modulus: &Self) -> Self {
        let decided = self.any_zero(other) || (!self.is_bottom() && !other.is_bottom() && modulus.is_concrete_zero());
        if decided && !modulus.is_bottom() {
            return Self::zero();
        }
        self.lift3(other, modulus, Word256::mulmod)
    }

    /// `self` raised to `exponent`.
    ///
    /// A concrete power whose partial product reaches `2^256` yields `Top`
    /// instead of the wrapped value: a precision/cost tradeoff, so the cost
    /// of a single call stays bounded.
    pub fn exp(&self, exponent: &Self) -> Self {
        match (self, exponent) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (_, Concrete(e)) if e.is_zero() => Self::one(),
            (Concrete(b), _) if b.to_u64() == Some(1) => Self::one(),
            (Concrete(b), Concrete(e)) => match b.checked_pow(e) {
                Some(v) => Concrete(v),
                None => {
                    log::trace!("exp({}, {}) overflows, degrading to Top", b, e);
                    Top
                }
            },
            _ => Self::unknown_of(&[self, exponent]),
        }
    }

    pub fn and(&self, other: &Self) -> Self {
        if self.any_zero(other) {
            return Self::zero();
        }
        self.lift2(other, Word256::and)
    }

    pub fn or(&self, other: &Self) -> Self {
        let all_ones = Concrete(Word256::max_value());
        if !self.is_bottom() && !other.is_bottom() && (*self == all_ones || *other == all_ones) {
            return all_ones;
        }
        self.lift2(other, Word256::or)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.lift2(other, Word256::xor)
    }

    pub fn not(&self) -> Self {
        self.lift1(Word256::complement)
    }

    /// Shift `self` left by `shift` bits.
    pub fn shl(&self, shift: &Self) -> Self {
        if self.shifts_out(shift) {
            return Self::zero();
        }
        self.lift2(shift, Word256::shift_left)
    }

    /// Logical shift of `self` right by `shift` bits.
    pub fn shr(&self, shift: &Self) -> Self {
        if self.shifts_out(shift) {
            return Self::zero();
        }
        self.lift2(shift, Word256::shift_right)
    }

    /// Arithmetic shift of `self` right by `shift` bits.
    pub fn sar(&self, shift: &Self) -> Self {
        if !shift.is_bottom() && self.is_concrete_zero() {
            return Self::zero();
        }
        self.lift2(shift, Word256::sar)
    }

    /// A logical shift whose result is zero whatever the unknown operand is.
    fn shifts_out(&self, shift: &Self) -> bool {
        if self.is_bottom() || shift.is_bottom() {
            return false;
        }
        let saturated = matches!(shift, Concrete(s) if s.to_u64().map_or(true, |s| s >= 256));
        saturated || self.is_concrete_zero()
    }

    pub fn lt(&self, other: &Self) -> Self {
        self.compare(other, |a, b| a < b)
    }

    pub fn gt(&self, other: &Self) -> Self {
        self.compare(other, |a, b| a > b)
    }

    pub fn slt(&self, other: &Self) -> Self {
        self.compare(other, |a, b| a.signed_cmp(b).is_lt())
    }

    pub fn sgt(&self, other: &Self) -> Self {
        self.compare(other, |a, b| a.signed_cmp(b).is_gt())
    }

    /// Equality test producing a word (`1` or `0`).
    pub fn equal(&self, other: &Self) -> Self {
        self.compare(other, |a, b| a == b)
    }

    pub fn iszero(&self) -> Self {
        match self {
            Bottom => Bottom,
            Concrete(w) => Self::from(w.is_zero()),
            _ => TopNotJumpTarget,
        }
    }

    /// Sign-extend `self` from byte `byte`.
    pub fn signextend(&self, byte: &Self) -> Self {
        self.lift2(byte, Word256::signextend)
    }

    /// Byte `index` of `self`, counting from the most significant.
    pub fn byte(&self, index: &Self) -> Self {
        let past_end = matches!(index, Concrete(i) if i.to_u64().map_or(true, |i| i >= 32));
        if past_end && !self.is_bottom() {
            return Self::zero();
        }
        self.lift2(index, Word256::byte)
    }
}

impl Lattice for ArithmeticWord {
    fn is_bottom(&self) -> bool {
        matches!(self, Bottom)
    }

    fn is_top(&self) -> bool {
        matches!(self, Top)
    }

    fn le(&self, other: &Self) -> bool {
        match (self, other) {
            (Bottom, _) | (_, Top) => true,
            (_, Bottom) | (Top, _) => false,
            (_, TopNotJumpTarget) => true,
            (TopNotJumpTarget, Concrete(_)) => false,
            (Concrete(a), Concrete(b)) => a == b,
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Bottom, x) | (x, Bottom) => x.clone(),
            (Top, _) | (_, Top) => Top,
            (Concrete(a), Concrete(b)) if a == b => self.clone(),
            _ => TopNotJumpTarget,
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Top, x) | (x, Top) => x.clone(),
            (Bottom, _) | (_, Bottom) => Bottom,
            (TopNotJumpTarget, x) | (x, TopNotJumpTarget) => x.clone(),
            (Concrete(a), Concrete(b)) if a == b => self.clone(),
            _ => Bottom,
        }
    }

    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }
}

impl fmt::Display for ArithmeticWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bottom => write!(f, "⊥"),
            Concrete(w) => write!(f, "{}", w),
            TopNotJumpTarget => write!(f, "⊤nj"),
            Top => write!(f, "⊤"),
        }
    }
}
