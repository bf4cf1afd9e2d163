//! Approximate k-NN via random-projection LSH.
//!
//! Each of the `L` tables owns one Gaussian `d×d` projection matrix, drawn
//! once at construction. A vector's bucket in a table is the projected vector
//! quantized component-wise by `bucket_width`. A query unions its bucket in
//! every table and ranks the candidates by exact Euclidean distance.
//!
//! Buckets are append-only index lists into one shared entry list, so `data`
//! is stored once no matter how many tables there are. Recall is below 100%
//! by construction; an empty result means "fall back to exact search".

use std::collections::{HashMap, HashSet};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WaveError};
use crate::point::{Neighbor, gauss_random, slice_distance};
use crate::vectorized::bottom_k_indices;

/// Bucket occupancy snapshot for monitoring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LshStats {
    pub num_tables: u32,
    pub dims: u32,
    pub bucket_width: f64,
    pub num_points: u64,
    pub total_buckets: u64,
    pub avg_bucket_size: f64,
    pub max_bucket_size: u64,
}

pub struct LshIndex<T> {
    bucket_width: f64,
    dims: usize,
    /// One row-major `dims × dims` matrix per table.
    projections: Vec<Vec<f64>>,
    tables: Vec<HashMap<Vec<i64>, Vec<usize>>>,
    entries: Vec<(Vec<f64>, T)>,
}

impl<T> LshIndex<T> {
    /// Draw the projection matrices from `rng`.
    ///
    /// Matrices are drawn table by table, so with the same seed the first
    /// `L` tables of a larger index are identical to a smaller one.
    pub fn new(num_tables: u32, bucket_width: f64, dims: u32, rng: &mut impl Rng) -> Result<Self> {
        if num_tables == 0 {
            return Err(WaveError::InvalidParameter(
                "lsh num_tables must be positive".to_string(),
            ));
        }
        if dims == 0 {
            return Err(WaveError::InvalidParameter(
                "lsh dims must be positive".to_string(),
            ));
        }
        if !(bucket_width.is_finite() && bucket_width > 0.0) {
            return Err(WaveError::InvalidParameter(format!(
                "lsh bucket_width must be positive and finite, got {bucket_width}"
            )));
        }

        let dims = dims as usize;
        let projections: Vec<Vec<f64>> = (0..num_tables)
            .map(|_| (0..dims * dims).map(|_| gauss_random(rng)).collect())
            .collect();
        let tables: Vec<HashMap<Vec<i64>, Vec<usize>>> =
            (0..num_tables).map(|_| HashMap::new()).collect();

        tracing::debug!(num_tables, bucket_width, dims, "lsh index created");

        Ok(Self {
            bucket_width,
            dims,
            projections,
            tables,
            entries: Vec::new(),
        })
    }

    /// Reproducible construction: identical seeds give identical bucket layouts.
    pub fn with_seed(num_tables: u32, bucket_width: f64, dims: u32, seed: u64) -> Result<Self> {
        let mut rng = SmallRng::seed_from_u64(seed);
        Self::new(num_tables, bucket_width, dims, &mut rng)
    }

    /// Insert `vector` into its bucket in every table. O(L).
    pub fn add(&mut self, vector: &[f64], data: T) -> Result<()> {
        self.check_dims(vector)?;
        let id = self.entries.len();
        for table in 0..self.tables.len() {
            let bucket = self.hash_into(vector, table);
            self.tables[table].entry(bucket).or_default().push(id);
        }
        self.entries.push((vector.to_vec(), data));
        Ok(())
    }

    /// Quantized bucket id of `vector` in `table`.
    pub fn bucket_id(&self, vector: &[f64], table: usize) -> Result<Vec<i64>> {
        self.check_dims(vector)?;
        if table >= self.tables.len() {
            return Err(WaveError::InvalidParameter(format!(
                "table {table} out of range (have {})",
                self.tables.len()
            )));
        }
        Ok(self.hash_into(vector, table))
    }

    fn hash_into(&self, vector: &[f64], table: usize) -> Vec<i64> {
        self.projections[table]
            .chunks_exact(self.dims)
            .map(|row| {
                let proj: f64 = row.iter().zip(vector).map(|(r, v)| r * v).sum();
                (proj / self.bucket_width).floor() as i64
            })
            .collect()
    }

    fn check_dims(&self, vector: &[f64]) -> Result<()> {
        if vector.len() != self.dims {
            return Err(WaveError::DimensionMismatch {
                expected: self.dims,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Distinct entries colliding with `vector` in at least one table, i.e.
    /// how many exact distances a query would compute.
    pub fn candidate_count(&self, vector: &[f64]) -> Result<usize> {
        self.check_dims(vector)?;
        Ok(self.candidates(vector).len())
    }

    fn candidates(&self, vector: &[f64]) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (table, buckets) in self.tables.iter().enumerate() {
            let bucket = self.hash_into(vector, table);
            if let Some(ids) = buckets.get(&bucket) {
                candidates.extend(ids.iter().copied().filter(|id| seen.insert(*id)));
            }
        }
        candidates
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn bucket_width(&self) -> f64 {
        self.bucket_width
    }

    pub fn stats(&self) -> LshStats {
        let mut total_buckets = 0u64;
        let mut occupied = 0u64;
        let mut max_bucket_size = 0u64;
        for table in &self.tables {
            for bucket in table.values() {
                total_buckets += 1;
                occupied += bucket.len() as u64;
                max_bucket_size = max_bucket_size.max(bucket.len() as u64);
            }
        }
        LshStats {
            num_tables: self.tables.len() as u32,
            dims: self.dims as u32,
            bucket_width: self.bucket_width,
            num_points: self.entries.len() as u64,
            total_buckets,
            avg_bucket_size: if total_buckets == 0 {
                0.0
            } else {
                occupied as f64 / total_buckets as f64
            },
            max_bucket_size,
        }
    }
}

impl<T: Clone> LshIndex<T> {
    /// Nearest `max_results` among the colliding candidates, ascending by distance.
    pub fn query(&self, vector: &[f64], max_results: usize) -> Result<Vec<Neighbor<T>>> {
        self.check_dims(vector)?;
        if self.entries.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.candidates(vector);
        let distances: Vec<f64> = candidates
            .iter()
            .map(|&id| slice_distance(&self.entries[id].0, vector))
            .collect();

        tracing::trace!(candidates = candidates.len(), "lsh candidates gathered");

        Ok(bottom_k_indices(&distances, max_results)
            .into_iter()
            .map(|i| Neighbor::new(self.entries[candidates[i]].1.clone(), distances[i]))
            .collect())
    }
}
