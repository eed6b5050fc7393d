//! Bounded powerset of machine words.
//!
//! A [`BoundedWordSet`] tracks up to [`K`] distinct concrete words. Any
//! operation whose result would hold more than `K` elements returns `Top`
//! instead: truncating would drop feasible values and be unsound.
//!
//! Every ascending chain has at most `K + 2` distinct elements (⊥, sets of
//! growing size, ⊤), so widening coincides with join.

use std::collections::BTreeSet;
use std::fmt;

use crate::lattice::Lattice;
use crate::value::ArithmeticWord;
use crate::word::Word256;

/// Maximum number of concrete values tracked per set.
pub const K: usize = 3;

/// A set of at most [`K`] words, or one of the extremes.
///
/// `Values` is never empty (the empty set is `Bottom`) and never holds more
/// than `K` elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundedWordSet {
    Bottom,
    Values(BTreeSet<Word256>),
    Top,
}

use BoundedWordSet::*;

impl Default for BoundedWordSet {
    fn default() -> Self {
        Top
    }
}

impl BoundedWordSet {
    pub fn singleton(value: Word256) -> Self {
        Values(BTreeSet::from([value]))
    }

    /// Builds a set from arbitrary values, collapsing to `Top` above `K`.
    pub fn from_values<I: IntoIterator<Item = Word256>>(values: I) -> Self {
        Self::normalize(values.into_iter().collect())
    }

    fn normalize(values: BTreeSet<Word256>) -> Self {
        if values.is_empty() {
            Bottom
        } else if values.len() > K {
            Top
        } else {
            Values(values)
        }
    }

    /// `{0, 1}`: an unknown boolean.
    pub fn boolean() -> Self {
        Self::from_values([Word256::zero(), Word256::one()])
    }

    pub fn values(&self) -> Option<&BTreeSet<Word256>> {
        match self {
            Values(values) => Some(values),
            _ => None,
        }
    }

    /// The only element, if the set is a singleton.
    pub fn as_singleton(&self) -> Option<&Word256> {
        match self {
            Values(values) if values.len() == 1 => values.iter().next(),
            _ => None,
        }
    }

    pub fn contains(&self, value: &Word256) -> bool {
        match self {
            Bottom => false,
            Values(values) => values.contains(value),
            Top => true,
        }
    }

    fn is_zero_set(&self) -> bool {
        self.as_singleton().is_some_and(Word256::is_zero)
    }

    /// Every element is non-zero.
    pub fn is_definitely_true(&self) -> bool {
        matches!(self, Values(values) if values.iter().all(|v| !v.is_zero()))
    }

    /// The set is exactly `{0}`.
    pub fn is_definitely_false(&self) -> bool {
        self.is_zero_set()
    }

    /// Elementwise map, for unary operations.
    fn map(&self, f: impl Fn(&Word256) -> Word256) -> Self {
        match self {
            Values(values) => Self::from_values(values.iter().map(f)),
            other => other.clone(),
        }
    }

    /// Cross product of two sets under a partial operation.
    ///
    /// `f` returning `None` for any pair makes the whole result `Top`.
    fn cross_partial(&self, other: &Self, f: impl Fn(&Word256, &Word256) -> Option<Word256>) -> Self {
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (Top, _) | (_, Top) => Top,
            (Values(xs), Values(ys)) => {
                let mut out = BTreeSet::new();
                for x in xs {
                    for y in ys {
                        match f(x, y) {
                            Some(v) => {
                                out.insert(v);
                            }
                            None => return Top,
                        }
                        if out.len() > K {
                            return Top;
                        }
                    }
                }
                Self::normalize(out)
            }
        }
    }

    fn cross(&self, other: &Self, f: impl Fn(&Word256, &Word256) -> Word256) -> Self {
        self.cross_partial(other, |x, y| Some(f(x, y)))
    }

    fn cross3(&self, b: &Self, c: &Self, f: impl Fn(&Word256, &Word256, &Word256) -> Word256) -> Self {
        match (self, b, c) {
            (Bottom, _, _) | (_, Bottom, _) | (_, _, Bottom) => Bottom,
            (Values(xs), Values(ys), Values(zs)) => {
                let mut out = BTreeSet::new();
                for x in xs {
                    for y in ys {
                        for z in zs {
                            out.insert(f(x, y, z));
                            if out.len() > K {
                                return Top;
                            }
                        }
                    }
                }
                Self::normalize(out)
            }
            _ => Top,
        }
    }

    /// Comparison lifted to sets: an unknown operand gives `{0, 1}`.
    fn compare(&self, other: &Self, f: impl Fn(&Word256, &Word256) -> bool) -> Self {
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (Top, _) | (_, Top) => Self::boolean(),
            _ => self.cross(other, |x, y| Word256::from(f(x, y))),
        }
    }

    pub fn sum(&self, other: &Self) -> Self {
        self.cross(other, Word256::wrapping_add)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.cross(other, Word256::wrapping_sub)
    }

    /// Product; a `{0}` operand yields `{0}` without forming the cross product.
    pub fn mul(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Bottom;
        }
        if self.is_zero_set() || other.is_zero_set() {
            return Self::singleton(Word256::zero());
        }
        self.cross(other, Word256::wrapping_mul)
    }

    /// Division is not tracked at set granularity yet: reachable operands
    /// give `Top`, except that a `{0}` dividend or divisor gives `{0}`.
    pub fn div(&self, other: &Self) -> Self {
        self.zero_guarded(other)
    }

    /// Like [`BoundedWordSet::div`], modulo is not tracked yet.
    pub fn rem(&self, other: &Self) -> Self {
        self.zero_guarded(other)
    }

    /// Signed division; same placeholder as [`BoundedWordSet::div`].
    pub fn sdiv(&self, other: &Self) -> Self {
        self.zero_guarded(other)
    }

    /// Signed modulo; same placeholder as [`BoundedWordSet::rem`].
    pub fn smod(&self, other: &Self) -> Self {
        self.zero_guarded(other)
    }

    /// `x / 0`, `x % 0`, `0 / y` and `0 % y` are all zero, signed or not.
    fn zero_guarded(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            Bottom
        } else if self.is_zero_set() || other.is_zero_set() {
            Self::singleton(Word256::zero())
        } else {
            Top
        }
    }

    pub fn addmod(&self, other: &Self, modulus: &Self) -> Self {
        self.cross3(other, modulus, Word256::addmod)
    }

    pub fn mulmod(&self, other: &Self, modulus: &Self) -> Self {
        self.cross3(other, modulus, Word256::mulmod)
    }

    /// Power; a pair whose power overflows `2^256` makes the result `Top`.
    pub fn exp(&self, exponent: &Self) -> Self {
        self.cross_partial(exponent, Word256::checked_pow)
    }

    pub fn and(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Bottom;
        }
        if self.is_zero_set() || other.is_zero_set() {
            return Self::singleton(Word256::zero());
        }
        self.cross(other, Word256::and)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.cross(other, Word256::or)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.cross(other, Word256::xor)
    }

    pub fn not(&self) -> Self {
        self.map(Word256::complement)
    }

    /// Shift each element of `self` left by each element of `shift`.
    pub fn shl(&self, shift: &Self) -> Self {
        self.cross(shift, Word256::shift_left)
    }

    pub fn shr(&self, shift: &Self) -> Self {
        self.cross(shift, Word256::shift_right)
    }

    pub fn sar(&self, shift: &Self) -> Self {
        self.cross(shift, Word256::sar)
    }

    pub fn signextend(&self, byte: &Self) -> Self {
        self.cross(byte, Word256::signextend)
    }

    pub fn byte(&self, index: &Self) -> Self {
        self.cross(index, Word256::byte)
    }

    pub fn lt(&self, other: &Self) -> Self {
        self.compare(other, |x, y| x < y)
    }

    pub fn gt(&self, other: &Self) -> Self {
        self.compare(other, |x, y| x > y)
    }

    pub fn slt(&self, other: &Self) -> Self {
        self.compare(other, |x, y| x.signed_cmp(y).is_lt())
    }

    pub fn sgt(&self, other: &Self) -> Self {
        self.compare(other, |x, y| x.signed_cmp(y).is_gt())
    }

    pub fn equal(&self, other: &Self) -> Self {
        self.compare(other, |x, y| x == y)
    }

    pub fn iszero(&self) -> Self {
        match self {
            Top => Self::boolean(),
            other => other.map(|v| Word256::from(v.is_zero())),
        }
    }
}

impl From<ArithmeticWord> for BoundedWordSet {
    fn from(value: ArithmeticWord) -> Self {
        match value {
            ArithmeticWord::Bottom => Bottom,
            ArithmeticWord::Concrete(w) => Self::singleton(w),
            ArithmeticWord::Top | ArithmeticWord::TopNotJumpTarget => Top,
        }
    }
}

impl From<&BoundedWordSet> for ArithmeticWord {
    /// Loses precision for sets of two or more values.
    fn from(value: &BoundedWordSet) -> Self {
        match value {
            Bottom => ArithmeticWord::Bottom,
            Top => ArithmeticWord::Top,
            Values(values) => match value.as_singleton() {
                Some(w) => ArithmeticWord::Concrete(w.clone()),
                None => values
                    .iter()
                    .map(|w| ArithmeticWord::Concrete(w.clone()))
                    .fold(ArithmeticWord::Bottom, |acc, w| acc.join(&w)),
            },
        }
    }
}

impl Lattice for BoundedWordSet {
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
            (Values(xs), Values(ys)) => xs.is_subset(ys),
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Bottom, x) | (x, Bottom) => x.clone(),
            (Top, _) | (_, Top) => Top,
            (Values(xs), Values(ys)) => Self::normalize(xs.union(ys).cloned().collect()),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Top, x) | (x, Top) => x.clone(),
            (Bottom, _) | (_, Bottom) => Bottom,
            (Values(xs), Values(ys)) => Self::normalize(xs.intersection(ys).cloned().collect()),
        }
    }

    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }
}

impl fmt::Display for BoundedWordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bottom => write!(f, "⊥"),
            Top => write!(f, "⊤"),
            Values(values) => {
                write!(f, "{{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
        }
    }
}
