//! Brute-force, data-parallel batch operations.
//!
//! These are the ground truth the LSH and KD-tree tiers are checked against,
//! and the linear fallback when neither index is built. Work is spread over
//! the rayon pool; results are always returned in input order.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::error::{Result, WaveError};
use crate::point::Point4;

/// Euclidean distance from `query` to every point.
pub fn distances(points: &[Point4], query: Point4) -> Vec<f64> {
    points.par_iter().map(|p| p.distance(query)).collect()
}

/// Resonance score of every position against `query`.
///
/// `brightness_i / (1 + d_i²) · (1 + gravity_i)`, clamped to [0, 1]. This is a
/// similarity (higher is closer), not a metric distance.
pub fn batch_resonance(
    positions: &[Point4],
    brightness: &[f64],
    gravity: &[f64],
    query: Point4,
) -> Result<Vec<f64>> {
    for len in [brightness.len(), gravity.len()] {
        if len != positions.len() {
            return Err(WaveError::DimensionMismatch {
                expected: positions.len(),
                got: len,
            });
        }
    }

    Ok(positions
        .par_iter()
        .zip(brightness.par_iter())
        .zip(gravity.par_iter())
        .map(|((p, &b), &g)| {
            let d2 = p.distance_squared(query);
            (b / (1.0 + d2) * (1.0 + g)).clamp(0.0, 1.0)
        })
        .collect())
}

/// Indices of the `k` largest values, largest first.
///
/// Partial selection, O(n) average plus O(k log k) to order the winners.
/// Equal values keep ascending index order.
pub fn top_k_indices(values: &[f64], k: usize) -> Vec<usize> {
    select_k(values, k, |a, b| b.total_cmp(a))
}

/// Indices of the `k` smallest values, smallest first.
pub fn bottom_k_indices(values: &[f64], k: usize) -> Vec<usize> {
    select_k(values, k, f64::total_cmp)
}

fn select_k(values: &[f64], k: usize, cmp: impl Fn(&f64, &f64) -> Ordering) -> Vec<usize> {
    let k = k.min(values.len());
    if k == 0 {
        return Vec::new();
    }
    let order = |a: &usize, b: &usize| cmp(&values[*a], &values[*b]).then(a.cmp(b));
    let mut indices: Vec<usize> = (0..values.len()).collect();
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, order);
        indices.truncate(k);
    }
    indices.sort_unstable_by(order);
    indices
}

/// Ground-truth k-NN: `(index, distance)` pairs, nearest first.
pub fn brute_force_knn(points: &[Point4], query: Point4, k: usize) -> Vec<(usize, f64)> {
    let d = distances(points, query);
    bottom_k_indices(&d, k)
        .into_iter()
        .map(|i| (i, d[i]))
        .collect()
}

/// Ground-truth range filter: every `(index, distance)` with distance ≤ `radius`,
/// nearest first.
pub fn linear_range(points: &[Point4], center: Point4, radius: f64) -> Vec<(usize, f64)> {
    let mut hits: Vec<(usize, f64)> = points
        .par_iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let d = p.distance(center);
            (d <= radius).then_some((i, d))
        })
        .collect();
    hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    hits
}

/// All-pairs squared distances, `N × M`. Memory is O(N·M); chunk large inputs.
pub fn pairwise_squared_distances(points: &[Point4], centers: &[Point4]) -> Vec<Vec<f64>> {
    points
        .par_iter()
        .map(|p| centers.iter().map(|c| p.distance_squared(*c)).collect())
        .collect()
}

/// For every point, the index of its nearest center and the distance to it.
pub fn batch_find_nearest(points: &[Point4], centers: &[Point4]) -> Result<Vec<(usize, f64)>> {
    if centers.is_empty() {
        return Err(WaveError::InvalidParameter(
            "batch_find_nearest needs at least one center".to_string(),
        ));
    }
    Ok(pairwise_squared_distances(points, centers)
        .into_iter()
        .map(|row| nearest_in_row(&row))
        .collect())
}

/// Same result as [`batch_find_nearest`] with at most `chunk_size × M`
/// distances alive at once.
pub fn batch_find_nearest_chunked(
    points: &[Point4],
    centers: &[Point4],
    chunk_size: usize,
) -> Result<Vec<(usize, f64)>> {
    if chunk_size == 0 {
        return Err(WaveError::InvalidParameter(
            "chunk_size must be positive".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(points.len());
    for chunk in points.chunks(chunk_size) {
        out.extend(batch_find_nearest(chunk, centers)?);
    }
    Ok(out)
}

fn nearest_in_row(row: &[f64]) -> (usize, f64) {
    let (idx, d2) = row
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, d2)| (i, *d2))
        .unwrap_or((0, f64::INFINITY));
    (idx, d2.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn test_top_k_matches_full_sort() {
        let mut rng = rng();
        let values: Vec<f64> = (0..500)
            .map(|_| Point4::random_in_cube(0.0, 1.0, &mut rng).x)
            .collect();
        let mut sorted: Vec<usize> = (0..values.len()).collect();
        sorted.sort_by(|a, b| values[*b].total_cmp(&values[*a]));

        assert_eq!(top_k_indices(&values, 10), sorted[..10].to_vec());
    }

    #[test]
    fn test_top_k_edge_cases() {
        assert!(top_k_indices(&[], 3).is_empty());
        assert!(top_k_indices(&[1.0, 2.0], 0).is_empty());
        assert_eq!(top_k_indices(&[1.0, 3.0, 2.0], 10), vec![1, 2, 0]);
        assert_eq!(bottom_k_indices(&[1.0, 3.0, 2.0], 2), vec![0, 2]);
    }

    #[test]
    fn test_top_k_ties_prefer_lower_index() {
        assert_eq!(top_k_indices(&[5.0, 5.0, 5.0, 1.0], 2), vec![0, 1]);
    }

    #[test]
    fn test_resonance_formula_and_clamp() {
        let positions = [
            Point4::origin(),
            Point4::new(1.0, 0.0, 0.0, 0.0),
            Point4::new(0.0, 0.0, 0.0, 0.0),
        ];
        let brightness = [0.5, 0.8, 3.0];
        let gravity = [0.0, 0.5, 0.0];
        let r = batch_resonance(&positions, &brightness, &gravity, Point4::origin()).unwrap();

        assert_relative_eq!(r[0], 0.5);
        // 0.8 / (1 + 1) * 1.5
        assert_relative_eq!(r[1], 0.6);
        assert_relative_eq!(r[2], 1.0);
    }

    #[test]
    fn test_resonance_negative_brightness_clamps_to_zero() {
        let r = batch_resonance(&[Point4::origin()], &[-2.0], &[0.0], Point4::origin()).unwrap();
        assert_eq!(r, vec![0.0]);
    }

    #[test]
    fn test_resonance_length_mismatch() {
        let positions = [Point4::origin(), Point4::origin()];
        assert!(matches!(
            batch_resonance(&positions, &[1.0], &[0.0, 0.0], Point4::origin()),
            Err(WaveError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_brute_force_knn_ordering() {
        let points = [
            Point4::new(5.0, 5.0, 5.0, 5.0),
            Point4::origin(),
            Point4::new(1.0, 1.0, 1.0, 1.0),
        ];
        let knn = brute_force_knn(&points, Point4::origin(), 2);
        assert_eq!(knn.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
        assert_relative_eq!(knn[1].1, 2.0);
    }

    #[test]
    fn test_linear_range_inclusive() {
        let points = [
            Point4::origin(),
            Point4::new(2.0, 0.0, 0.0, 0.0),
            Point4::new(2.5, 0.0, 0.0, 0.0),
        ];
        let hits = linear_range(&points, Point4::origin(), 2.0);
        assert_eq!(hits.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_find_nearest_matches_chunked() {
        let mut rng = rng();
        let points: Vec<Point4> = (0..257)
            .map(|_| Point4::random_in_cube(-3.0, 3.0, &mut rng))
            .collect();
        let centers: Vec<Point4> = (0..7)
            .map(|_| Point4::random_in_cube(-3.0, 3.0, &mut rng))
            .collect();

        let full = batch_find_nearest(&points, &centers).unwrap();
        let chunked = batch_find_nearest_chunked(&points, &centers, 32).unwrap();
        assert_eq!(full, chunked);

        for (p, (ci, d)) in points.iter().zip(&full) {
            let best = centers
                .iter()
                .map(|c| p.distance(*c))
                .fold(f64::INFINITY, f64::min);
            assert_relative_eq!(*d, best);
            assert_relative_eq!(p.distance(centers[*ci]), best);
        }
    }

    #[test]
    fn test_find_nearest_rejects_bad_input() {
        assert!(batch_find_nearest(&[Point4::origin()], &[]).is_err());
        assert!(batch_find_nearest_chunked(&[Point4::origin()], &[Point4::origin()], 0).is_err());
    }

    #[test]
    fn test_pairwise_shape() {
        let m = pairwise_squared_distances(&[Point4::origin(); 3], &[Point4::origin(); 5]);
        assert_eq!(m.len(), 3);
        assert!(m.iter().all(|row| row.len() == 5));
    }
}
