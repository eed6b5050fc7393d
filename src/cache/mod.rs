//! Bounded caches for memoizing expensive lookups.
//!
//! | Implementation | Synchronization | Memory | Use Case |
//! |----------------|-----------------|--------|----------|
//! | [`BasicCache`] | none (`&mut self`) | fixed | single-threaded memoization |
//! | [`StripedCache`] | one mutex per stripe | fixed | shared across analysis workers |
//!
//! Both are direct-mapped: a colliding insert evicts the previous entry, so
//! a cache never grows past the size chosen at construction.
//!
//! # Example
//!
//! ```
//! use evm_absint::cache::StripedCache;
//!
//! let cache = StripedCache::<u64, u64>::new(2, 8);
//! cache.insert(1, 42);
//! assert_eq!(cache.get(&1), Some(42));
//! ```

mod basic;
mod striped;

pub use basic::BasicCache;
pub use striped::{CacheStats, StripedCache};
