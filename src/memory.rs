//! Address-indexed maps from words to abstract values.
//!
//! An [`AddressSpace`] models either volatile memory (byte-addressed, one
//! entry per 32-byte word written) or persistent storage (slot-addressed).
//! Absent keys read as a default value, so `load` is total.
//!
//! Maps are persistent: `store` leaves the receiver untouched. The entry
//! table sits behind an [`Arc`], so cloning a state is cheap and a table is
//! copied only when a store actually changes it.
//!
//! An entry records that its address was written, even when the value
//! equals the default. Storage relies on this to tell slots written along
//! some path from pristine ones, whose value may still be fetched from a
//! concrete source.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::bits::WORD_BYTES;
use crate::error::Result;
use crate::lattice::Lattice;
use crate::value::ArithmeticWord;
use crate::word::Word256;

/// An abstract address space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Bottom,
    Map {
        entries: Arc<BTreeMap<Word256, ArithmeticWord>>,
        default: ArithmeticWord,
    },
    Top,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new(ArithmeticWord::Top)
    }
}

impl AddressSpace {
    /// An empty map whose absent keys read as `default`.
    pub fn new(default: ArithmeticWord) -> Self {
        AddressSpace::Map {
            entries: Arc::new(BTreeMap::new()),
            default,
        }
    }

    pub fn top() -> Self {
        AddressSpace::Top
    }

    pub fn bottom() -> Self {
        AddressSpace::Bottom
    }

    /// Number of recorded entries (zero for `Top` and `Bottom`).
    pub fn len(&self) -> usize {
        match self {
            AddressSpace::Map { entries, .. } => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded entries in address order.
    pub fn entries(&self) -> impl Iterator<Item = (&Word256, &ArithmeticWord)> {
        let map = match self {
            AddressSpace::Map { entries, .. } => Some(entries.iter()),
            _ => None,
        };
        map.into_iter().flatten()
    }

    /// The value read at an address with no entry.
    pub fn default_value(&self) -> ArithmeticWord {
        match self {
            AddressSpace::Bottom => ArithmeticWord::Bottom,
            AddressSpace::Map { default, .. } => default.clone(),
            AddressSpace::Top => ArithmeticWord::Top,
        }
    }

    pub fn load(&self, addr: &Word256) -> ArithmeticWord {
        match self {
            AddressSpace::Bottom => ArithmeticWord::Bottom,
            AddressSpace::Map { entries, default } => entries.get(addr).unwrap_or(default).clone(),
            AddressSpace::Top => ArithmeticWord::Top,
        }
    }

    /// The value recorded at `addr`, or `None` if it was never written.
    pub fn recorded(&self, addr: &Word256) -> Option<&ArithmeticWord> {
        match self {
            AddressSpace::Map { entries, .. } => entries.get(addr),
            _ => None,
        }
    }

    /// Returns a map with `addr` bound to `value`.
    ///
    /// Storing `Bottom` makes the whole map `Bottom`.
    pub fn store(&self, addr: Word256, value: ArithmeticWord) -> Self {
        self.update(|entries, _| {
            entries.insert(addr, value);
        })
    }

    /// Stores a word given as exactly 32 big-endian bytes.
    pub fn store_bytes(&self, addr: Word256, bytes: &[u8]) -> Result<Self> {
        let value = Word256::from_be_slice(bytes)?;
        Ok(self.store(addr, ArithmeticWord::Concrete(value)))
    }

    /// Forgets every 32-byte word whose span overlaps `[start, start + len)`.
    ///
    /// Byte-addressed memory needs this before any write, since a word
    /// recorded at a nearby offset shares bytes with the written range.
    pub fn invalidate(&self, start: &Word256, len: usize) -> Self {
        if len == 0 {
            return self.clone();
        }
        let reach = Word256::from(WORD_BYTES - 1);
        let lo = if *start >= reach {
            start.wrapping_sub(&reach)
        } else {
            Word256::zero()
        };
        let hi = start.wrapping_add(&Word256::from(len - 1));
        let hi = if hi < *start { Word256::max_value() } else { hi };

        let hit = match self {
            AddressSpace::Map { entries, .. } => entries.range(lo.clone()..=hi.clone()).next().is_some(),
            _ => false,
        };
        if !hit {
            return self.clone();
        }
        self.update(|entries, _| {
            let doomed: Vec<Word256> = entries.range(lo..=hi).map(|(k, _)| k.clone()).collect();
            log::trace!("invalidating {} overlapping word(s)", doomed.len());
            for k in doomed {
                entries.remove(&k);
            }
        })
    }

    /// Copy-on-write update of the entry table; `Top` and `Bottom` are left as is.
    fn update(&self, f: impl FnOnce(&mut BTreeMap<Word256, ArithmeticWord>, &ArithmeticWord)) -> Self {
        match self {
            AddressSpace::Map { entries, default } => {
                let mut entries = Arc::clone(entries);
                f(Arc::make_mut(&mut entries), default);
                if entries.values().any(|v| v.is_bottom()) {
                    return AddressSpace::Bottom;
                }
                AddressSpace::Map {
                    entries,
                    default: default.clone(),
                }
            }
            other => other.clone(),
        }
    }

    /// Pointwise combination over the union of keys.
    ///
    /// A component of `Bottom` makes the whole result `Bottom`.
    fn pointwise(&self, other: &Self, f: impl Fn(&ArithmeticWord, &ArithmeticWord) -> ArithmeticWord) -> Self {
        let default = f(&self.default_value(), &other.default_value());
        let mut entries = BTreeMap::new();
        let keys = self.entries().map(|(k, _)| k).chain(other.entries().map(|(k, _)| k));
        for key in keys {
            if entries.contains_key(key) {
                continue;
            }
            let value = f(&self.load(key), &other.load(key));
            if value.is_bottom() {
                return AddressSpace::Bottom;
            }
            entries.insert(key.clone(), value);
        }
        AddressSpace::Map {
            entries: Arc::new(entries),
            default,
        }
    }
}

impl Lattice for AddressSpace {
    fn is_bottom(&self) -> bool {
        matches!(self, AddressSpace::Bottom)
    }

    fn is_top(&self) -> bool {
        matches!(self, AddressSpace::Top)
    }

    fn le(&self, other: &Self) -> bool {
        match (self, other) {
            (AddressSpace::Bottom, _) | (_, AddressSpace::Top) => true,
            (_, AddressSpace::Bottom) | (AddressSpace::Top, _) => false,
            _ => {
                self.default_value().le(&other.default_value())
                    && self
                        .entries()
                        .map(|(k, _)| k)
                        .chain(other.entries().map(|(k, _)| k))
                        .all(|k| self.load(k).le(&other.load(k)))
            }
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (AddressSpace::Bottom, x) | (x, AddressSpace::Bottom) => x.clone(),
            (AddressSpace::Top, _) | (_, AddressSpace::Top) => AddressSpace::Top,
            _ => self.pointwise(other, ArithmeticWord::join),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (AddressSpace::Top, x) | (x, AddressSpace::Top) => x.clone(),
            (AddressSpace::Bottom, _) | (_, AddressSpace::Bottom) => AddressSpace::Bottom,
            _ => self.pointwise(other, ArithmeticWord::meet),
        }
    }

    /// Keys are only introduced by stores at singleton offsets, which are
    /// finitely many once the stack stabilizes, and the value lattice has
    /// finite height.
    fn widen(&self, other: &Self) -> Self {
        match (self, other) {
            (AddressSpace::Bottom, x) | (x, AddressSpace::Bottom) => x.clone(),
            (AddressSpace::Top, _) | (_, AddressSpace::Top) => AddressSpace::Top,
            _ => self.pointwise(other, ArithmeticWord::widen),
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpace::Bottom => write!(f, "⊥"),
            AddressSpace::Top => write!(f, "⊤"),
            AddressSpace::Map { entries, default } => {
                write!(f, "[")?;
                for (k, v) in entries.iter() {
                    write!(f, "{} ↦ {}, ", k, v)?;
                }
                write!(f, "_ ↦ {}]", default)
            }
        }
    }
}
