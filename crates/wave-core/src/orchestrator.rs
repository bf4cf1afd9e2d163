//! Routing policy over the Bloom gate and the memo cache.
//!
//! Every query walks the same three steps:
//! 1. Bloom reject: a query the filter has never observed returns the empty
//!    result without running any search.
//! 2. Cache hit: a memoized answer for `(query, k)` is returned as is.
//! 3. Compute: the caller's search function (linear, LSH or KD-tree) runs,
//!    is timed, and its answer is cached; the query is marked in the filter.
//!
//! The filter only knows what it has been shown, so callers admit their query
//! universe (typically the indexed points) before the first query.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::bloom::{BloomFilter, BloomStats};
use crate::cache::{CacheStats, WaveCache};
use crate::constants::{DEFAULT_CACHE_SIZE, DEFAULT_EXPECTED_ITEMS, DEFAULT_FALSE_POSITIVE_RATE};
use crate::error::Result;
use crate::key::CacheKey;
use crate::point::Point4;
use crate::time::elapsed_ms;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub expected_items: u64,
    pub false_positive_rate: f64,
    pub cache_size: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            expected_items: DEFAULT_EXPECTED_ITEMS,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// Which tier answered a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPath {
    BloomRejected,
    CacheHit,
    Computed,
}

#[derive(Clone, Debug)]
pub struct QueryOutcome<V> {
    pub value: V,
    pub path: QueryPath,
    /// Search time for `Computed`, the originally recorded time for `CacheHit`,
    /// zero for `BloomRejected`.
    pub compute_time_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub queries: u64,
    pub bloom_rejections: u64,
    pub cache_hits: u64,
    pub computed: u64,
    pub exact_requests: u64,
    pub cache: CacheStats,
    pub bloom: BloomStats,
}

pub struct OptimizationOrchestrator<V> {
    bloom: BloomFilter,
    cache: WaveCache<(Point4, usize), V>,
    queries: u64,
    bloom_rejections: u64,
    cache_hits: u64,
    computed: u64,
    exact_requests: u64,
}

impl<V: Clone + Default> OptimizationOrchestrator<V> {
    pub fn new(config: &OrchestratorConfig) -> Result<Self> {
        Ok(Self {
            bloom: BloomFilter::new(config.expected_items, config.false_positive_rate)?,
            cache: WaveCache::new(config.cache_size)?,
            queries: 0,
            bloom_rejections: 0,
            cache_hits: 0,
            computed: 0,
            exact_requests: 0,
        })
    }

    /// Mark `point` as a legitimate query target.
    pub fn admit(&mut self, point: Point4) {
        self.bloom.add(&point.canonical());
    }

    pub fn admit_all<'a>(&mut self, points: impl IntoIterator<Item = &'a Point4>) {
        for p in points {
            self.admit(*p);
        }
    }

    /// Answer `query` through the Bloom gate and cache, running `search_fn` on a miss.
    ///
    /// `exact` is recorded but does not change routing: callers pick an exact
    /// or approximate search function themselves.
    pub fn optimize_query<F>(
        &mut self,
        query: Point4,
        k: usize,
        search_fn: F,
        exact: bool,
    ) -> QueryOutcome<V>
    where
        F: FnOnce(Point4, usize) -> V,
    {
        if let Some(outcome) = self.check(query, k, exact) {
            return outcome;
        }
        let start = Instant::now();
        let value = search_fn(query, k);
        let ms = elapsed_ms(start);
        self.store(query, k, value.clone(), ms);
        QueryOutcome {
            value,
            path: QueryPath::Computed,
            compute_time_ms: ms,
        }
    }

    /// Steps 1 and 2. `None` means the caller must compute and `store`.
    pub fn check(&mut self, query: Point4, k: usize, exact: bool) -> Option<QueryOutcome<V>> {
        self.queries += 1;
        if exact {
            self.exact_requests += 1;
        }

        if !self.bloom.might_contain(&query.canonical()) {
            self.bloom_rejections += 1;
            tracing::trace!(?query, "bloom rejected query");
            return Some(QueryOutcome {
                value: V::default(),
                path: QueryPath::BloomRejected,
                compute_time_ms: 0.0,
            });
        }

        let key = (query, k);
        let value = self.cache.get(&key)?.clone();
        self.cache_hits += 1;
        let compute_time_ms = self
            .cache
            .peek(&key)
            .map(|e| e.compute_time_ms)
            .unwrap_or_default();
        Some(QueryOutcome {
            value,
            path: QueryPath::CacheHit,
            compute_time_ms,
        })
    }

    /// Step 3 bookkeeping: memoize `value` and mark `query` as observed.
    pub fn store(&mut self, query: Point4, k: usize, value: V, compute_time_ms: f64) {
        self.computed += 1;
        self.cache.put(value, compute_time_ms, &(query, k));
        self.bloom.add(&query.canonical());
        tracing::debug!(k, compute_time_ms, "computed and cached query");
    }

    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    pub fn cache(&self) -> &WaveCache<(Point4, usize), V> {
        &self.cache
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            queries: self.queries,
            bloom_rejections: self.bloom_rejections,
            cache_hits: self.cache_hits,
            computed: self.computed,
            exact_requests: self.exact_requests,
            cache: self.cache.stats(),
            bloom: self.bloom.stats(),
        }
    }
}

/// Thread-safe handle: one mutex, held only for the check and the store.
/// The search itself runs unlocked, so two threads missing on the same key
/// may both compute it; the later store wins.
pub struct SharedOrchestrator<V> {
    inner: Arc<Mutex<OptimizationOrchestrator<V>>>,
}

impl<V> Clone for SharedOrchestrator<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Default> SharedOrchestrator<V> {
    pub fn new(orchestrator: OptimizationOrchestrator<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
        }
    }

    pub fn admit_all<'a>(&self, points: impl IntoIterator<Item = &'a Point4>) {
        self.inner.lock().admit_all(points);
    }

    pub fn optimize_query<F>(
        &self,
        query: Point4,
        k: usize,
        search_fn: F,
        exact: bool,
    ) -> QueryOutcome<V>
    where
        F: FnOnce(Point4, usize) -> V,
    {
        if let Some(outcome) = self.inner.lock().check(query, k, exact) {
            return outcome;
        }
        let start = Instant::now();
        let value = search_fn(query, k);
        let ms = elapsed_ms(start);
        self.inner.lock().store(query, k, value.clone(), ms);
        QueryOutcome {
            value,
            path: QueryPath::Computed,
            compute_time_ms: ms,
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.inner.lock().stats()
    }
}
