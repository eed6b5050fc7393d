//! Lock-striped cache shared between analysis threads.
//!
//! The key space is split across `2^stripe_bits` independent [`BasicCache`]s,
//! each behind its own [`Mutex`]. Two lookups contend only when their keys
//! land on the same stripe. Capacity is fixed at construction.

use std::sync::{Mutex, MutexGuard};

use super::BasicCache;
use crate::utils::{mix64, MyHash};

pub struct StripedCache<K, V> {
    stripes: Vec<Mutex<BasicCache<K, V>>>,
    mask: u64,
}

impl<K, V> Default for StripedCache<K, V> {
    fn default() -> Self {
        Self::new(4, 10)
    }
}

/// Cache statistics summed over all stripes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub faults: usize,
}

impl<K, V> StripedCache<K, V> {
    /// Creates `2^stripe_bits` stripes of `2^slot_bits` slots each.
    pub fn new(stripe_bits: usize, slot_bits: usize) -> Self {
        assert!(stripe_bits <= 16, "Stripe bits must be in range 0..=16, got {}", stripe_bits);
        let count = 1usize << stripe_bits;
        Self {
            stripes: (0..count).map(|_| Mutex::new(BasicCache::new(slot_bits))).collect(),
            mask: (count - 1) as u64,
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.stripes.iter().map(|s| lock(s).capacity()).sum()
    }

    pub fn stats(&self) -> CacheStats {
        self.stripes.iter().fold(CacheStats::default(), |acc, s| {
            let s = lock(s);
            CacheStats {
                hits: acc.hits + s.hits(),
                misses: acc.misses + s.misses(),
                faults: acc.faults + s.faults(),
            }
        })
    }

    pub fn clear(&self) {
        for s in &self.stripes {
            lock(s).clear();
        }
    }
}

impl<K, V> StripedCache<K, V>
where
    K: MyHash + Eq,
    V: Clone,
{
    fn stripe(&self, key: &K) -> MutexGuard<'_, BasicCache<K, V>> {
        // Re-mix so the stripe index uses different bits than the slot index.
        let idx = (mix64(key.hash().rotate_left(32)) & self.mask) as usize;
        lock(&self.stripes[idx])
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.stripe(key).get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.stripe(&key).insert(key, value);
    }

    /// Returns the cached value, or computes, stores and returns it.
    ///
    /// `compute` runs without holding the stripe lock, so concurrent callers
    /// may compute the same value twice; the last insert wins.
    pub fn get_or_try_insert_with<E>(&self, key: K, compute: impl FnOnce(&K) -> Result<V, E>) -> Result<V, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = compute(&key)?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

/// A poisoned stripe holds plain data that is still consistent, so keep using it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
