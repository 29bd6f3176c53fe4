//! Splittable randomness keys.
//!
//! Every stochastic operation in the crate (weight init, dropout, action
//! sampling) takes an explicit [`Key`] rather than drawing from a global RNG.
//! Keys split deterministically, so two children of the same key are
//! decorrelated and a whole model initialization replays bit-for-bit from one
//! root seed.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// A value-type PRNG key. Copy it freely; splitting never mutates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Key(u64);

impl Key {
    /// Root key from a seed.
    pub fn new(seed: u64) -> Self {
        Key(mix(seed))
    }

    /// Derive a child key identified by an integer tag.
    ///
    /// `k.fold_in(a) != k.fold_in(b)` whenever `a != b`, and children of
    /// distinct parents never collide in practice.
    pub fn fold_in(self, tag: u64) -> Key {
        Key(mix(self.0 ^ mix(tag.wrapping_add(1))))
    }

    /// Split into `N` decorrelated child keys.
    pub fn split<const N: usize>(self) -> [Key; N] {
        core::array::from_fn(|i| self.fold_in(i as u64))
    }

    /// Split into `n` decorrelated child keys.
    pub fn split_n(self, n: usize) -> Vec<Key> {
        (0..n).map(|i| self.fold_in(i as u64)).collect()
    }

    /// Materialize a seeded RNG for actual sampling.
    pub fn rng(self) -> StdRng {
        StdRng::seed_from_u64(self.0)
    }
}

/// SplitMix64 finalizer.
fn mix(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
