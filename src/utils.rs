//! Hashing helpers for cache keys.

use crate::word::Word256;

/// [Szudzik pairing function][szudzik-pairing], wrapping on overflow.
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// Exactly injective only while the result fits in 64 bits; beyond that it
/// is a mixing step, which is all a direct-mapped cache needs.
///
/// [szudzik-pairing]: http://szudzik.com/ElegantPairing.pdf
pub fn pairing2(a: u64, b: u64) -> u64 {
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

/// Finalizer from SplitMix64, spreads low-entropy keys over all bits.
pub fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

pub trait MyHash {
    /// Hash used to select a cache slot.
    fn hash(&self) -> u64;
}

impl MyHash for u64 {
    fn hash(&self) -> u64 {
        mix64(*self)
    }
}

impl MyHash for Word256 {
    fn hash(&self) -> u64 {
        let bytes = self.to_be_bytes();
        let limbs = bytes.chunks_exact(8).map(|chunk| {
            let mut limb = [0u8; 8];
            limb.copy_from_slice(chunk);
            u64::from_be_bytes(limb)
        });
        mix64(limbs.fold(0, pairing2))
    }
}

impl MyHash for (Word256, Word256) {
    fn hash(&self) -> u64 {
        mix64(pairing2(MyHash::hash(&self.0), MyHash::hash(&self.1)))
    }
}
