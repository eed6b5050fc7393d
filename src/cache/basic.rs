//! Direct-mapped cache with minimal overhead.
//!
//! A plain array where each key hashes to exactly one slot. Collisions
//! simply overwrite the previous entry, so memory use is fixed at creation.
//!
//! Not synchronized: wrap it in a lock, or use [`StripedCache`][super::StripedCache].

use crate::utils::MyHash;

/// A direct-mapped cache.
pub struct BasicCache<K, V> {
    entries: Vec<Option<(K, V)>>,
    bitmask: u64,
    hits: usize,
    misses: usize,
    faults: usize,
}

impl<K, V> Default for BasicCache<K, V> {
    fn default() -> Self {
        Self::new(10)
    }
}

impl<K, V> BasicCache<K, V> {
    /// Creates a new cache with `2^bits` slots.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Cache bits must be in range 0..=31, got {}", bits);

        let size = 1usize << bits;
        let bitmask = (size - 1) as u64;

        Self {
            entries: (0..size).map(|_| None).collect(),
            bitmask,
            hits: 0,
            misses: 0,
            faults: 0,
        }
    }

    /// Returns the number of slots in the cache.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Returns the number of cache faults (misses on a slot held by another key).
    pub fn faults(&self) -> usize {
        self.faults
    }

    /// Clears all entries. This is O(n).
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
    }
}

impl<K, V> BasicCache<K, V>
where
    K: MyHash + Eq,
{
    #[inline]
    fn index(&self, key: &K) -> usize {
        (key.hash() & self.bitmask) as usize
    }

    /// Looks up a key in the cache.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = self.index(key);

        match &self.entries[idx] {
            Some((k, v)) if k == key => {
                self.hits += 1;
                Some(v)
            }
            Some(_) => {
                self.faults += 1;
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Inserts a key-value pair, overwriting any existing entry at the same slot.
    pub fn insert(&mut self, key: K, value: V) {
        let idx = self.index(&key);
        self.entries[idx] = Some((key, value));
    }
}
