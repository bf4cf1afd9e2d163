//! Query acceleration for similarity search over 4D coordinate vectors.
//!
//! Four tiers answer nearest-neighbor questions at different price points:
//! a Bloom filter rejects queries that were never seen, an LRU memo returns
//! previously computed answers, an LSH index gives fast approximate k-NN,
//! and a KD-tree gives exact k-NN and range queries. The brute-force
//! `vectorized` module is the ground truth the other tiers are checked against.
//!
//! Zero I/O. The only boundary is the stats JSON string handed to monitoring.

pub mod bloom;
pub mod cache;
pub mod constants;
pub mod error;
pub mod kdtree;
pub mod key;
pub mod lsh;
pub mod orchestrator;
pub mod point;
pub mod stats;
pub mod time;
pub mod vectorized;

pub use bloom::{BloomFilter, BloomStats};
pub use cache::{CacheEntry, CacheStats, WaveCache};
pub use constants::{
    DEFAULT_BUCKET_WIDTH, DEFAULT_CACHE_SIZE, DEFAULT_EXPECTED_ITEMS, DEFAULT_FALSE_POSITIVE_RATE,
    DEFAULT_NUM_TABLES, DIMS,
};
pub use error::{Result, WaveError};
pub use kdtree::{KdNode, KdTree4D, KdTreeStats};
pub use key::CacheKey;
pub use lsh::{LshIndex, LshStats};
pub use orchestrator::{
    OptimizationOrchestrator, OrchestratorConfig, OrchestratorStats, QueryOutcome, QueryPath,
    SharedOrchestrator,
};
pub use point::{Neighbor, Point4};
pub use stats::{AccelerationStats, export_stats_json};
