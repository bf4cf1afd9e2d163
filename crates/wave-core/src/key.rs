//! Typed cache keys with canonical, collision-free hashing.
//!
//! Floats are keyed by bit pattern after folding `-0.0` into `0.0` and every
//! NaN into one quiet NaN, so two queries that compare equal always land on
//! the same cache slot and Bloom bits.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::point::Point4;

/// A value usable as a memo-cache or Bloom-filter key.
pub trait CacheKey {
    /// Owned canonical form; equality on it defines key identity.
    type Canonical: Eq + Hash + Clone;

    fn canonical(&self) -> Self::Canonical;

    /// 64-bit digest of the canonical form.
    fn key_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.canonical().hash(&mut hasher);
        hasher.finish()
    }
}

/// Canonical bit pattern of an `f64`.
pub fn canonical_f64(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

impl CacheKey for str {
    type Canonical = String;

    fn canonical(&self) -> String {
        self.to_owned()
    }
}

impl CacheKey for String {
    type Canonical = String;

    fn canonical(&self) -> String {
        self.clone()
    }
}

impl CacheKey for u64 {
    type Canonical = u64;

    fn canonical(&self) -> u64 {
        *self
    }
}

impl CacheKey for Point4 {
    type Canonical = [u64; 4];

    fn canonical(&self) -> [u64; 4] {
        self.to_array().map(canonical_f64)
    }
}

/// Query point plus result count.
impl CacheKey for (Point4, usize) {
    type Canonical = ([u64; 4], usize);

    fn canonical(&self) -> ([u64; 4], usize) {
        (self.0.canonical(), self.1)
    }
}
