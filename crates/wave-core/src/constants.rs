/// Dimensionality of the coordinate space.
pub const DIMS: usize = 4;

/// Bloom filter design capacity when none is configured.
pub const DEFAULT_EXPECTED_ITEMS: u64 = 10_000;

/// Bloom filter target false-positive rate when none is configured.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Memo cache capacity when none is configured.
pub const DEFAULT_CACHE_SIZE: u64 = 1_000;

/// LSH table count. More tables raise recall at the cost of memory and query time.
pub const DEFAULT_NUM_TABLES: u32 = 5;

/// LSH quantization width in projected units.
pub const DEFAULT_BUCKET_WIDTH: f64 = 1.0;
