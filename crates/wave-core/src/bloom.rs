//! Bloom filter for early rejection of queries that were never observed.
//!
//! Append-only: bits are never cleared, so precision degrades monotonically
//! as items are added. `might_contain` returning `false` is always correct.

use std::collections::hash_map::DefaultHasher;
use std::f64::consts::LN_2;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WaveError};

/// Snapshot of filter occupancy for monitoring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BloomStats {
    pub size_bits: u64,
    pub num_hashes: u32,
    pub item_count: u64,
    pub fill_ratio: f64,
    pub estimated_fp_rate: f64,
}

#[derive(Clone, Debug)]
pub struct BloomFilter {
    bits: Vec<u64>,
    size_bits: u64,
    seeds: Vec<u64>,
    expected_items: u64,
    item_count: u64,
}

impl BloomFilter {
    /// Size the filter for `expected_items` at `false_positive_rate`.
    ///
    /// m = ceil(-(n ln p) / (ln 2)²), k = round((m / n) ln 2), k >= 1.
    pub fn new(expected_items: u64, false_positive_rate: f64) -> Result<Self> {
        if expected_items == 0 {
            return Err(WaveError::InvalidCapacity(
                "bloom filter expected_items must be positive".to_string(),
            ));
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(WaveError::InvalidRate(false_positive_rate));
        }

        let n = expected_items as f64;
        let m = (-(n * false_positive_rate.ln()) / (LN_2 * LN_2)).ceil().max(1.0) as u64;
        let k = ((m as f64 / n) * LN_2).round().max(1.0) as u32;

        // Seeds spread by the golden-ratio constant so no two hash streams coincide.
        let seeds = (0..k as u64)
            .map(|i| (i + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .collect();
        let words = m.div_ceil(64) as usize;

        tracing::debug!(expected_items, false_positive_rate, m, k, "bloom filter sized");

        Ok(Self {
            bits: vec![0; words],
            size_bits: m,
            seeds,
            expected_items,
            item_count: 0,
        })
    }

    /// Set the `k` bits for `item`.
    pub fn add<T: Hash + ?Sized>(&mut self, item: &T) {
        for i in 0..self.seeds.len() {
            let bit = self.bit_index(item, self.seeds[i]);
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.item_count += 1;
        if self.item_count == self.expected_items + 1 {
            tracing::warn!(
                expected_items = self.expected_items,
                "bloom filter exceeded its design capacity; false-positive rate will climb"
            );
        }
    }

    /// `false` means `item` was definitely never added. `true` may be a false positive.
    pub fn might_contain<T: Hash + ?Sized>(&self, item: &T) -> bool {
        self.seeds.iter().all(|&seed| {
            let bit = self.bit_index(item, seed);
            self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0
        })
    }

    fn bit_index<T: Hash + ?Sized>(&self, item: &T, seed: u64) -> u64 {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        item.hash(&mut hasher);
        hasher.finish() % self.size_bits
    }

    pub fn size_bits(&self) -> u64 {
        self.size_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.seeds.len() as u32
    }

    /// Number of `add` calls. Advisory only: duplicates are counted twice.
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Fraction of bits set.
    pub fn fill_ratio(&self) -> f64 {
        let set: u64 = self.bits.iter().map(|w| w.count_ones() as u64).sum();
        set as f64 / self.size_bits as f64
    }

    /// Current false-positive probability implied by the fill ratio: fill^k.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        self.fill_ratio().powi(self.seeds.len() as i32)
    }

    pub fn stats(&self) -> BloomStats {
        BloomStats {
            size_bits: self.size_bits,
            num_hashes: self.num_hashes(),
            item_count: self.item_count,
            fill_ratio: self.fill_ratio(),
            estimated_fp_rate: self.estimated_false_positive_rate(),
        }
    }
}
