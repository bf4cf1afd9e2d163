//! Point sets: JSON point files and seeded random data.

use std::path::Path;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use wave_core::Point4;

/// One record of a point file: `{"label": "A", "coords": [x, y, z, w]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledPoint {
    pub label: String,
    pub coords: Vec<f64>,
}

/// Load a JSON array of labeled points. Every record must have exactly 4 coordinates.
pub fn load_points(path: &Path) -> Result<Vec<(Point4, String)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<LabeledPoint> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let point = Point4::from_slice(&r.coords)
                .with_context(|| format!("record {i} ({})", r.label))?;
            Ok((point, r.label))
        })
        .collect()
}

/// `n` uniform points in the unit cube, labeled by index.
pub fn random_points(n: usize, seed: u64) -> Vec<(Point4, String)> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|i| (Point4::random_in_cube(0.0, 1.0, &mut rng), format!("p{i}")))
        .collect()
}
