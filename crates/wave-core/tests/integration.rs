//! Cross-module properties: every accelerated tier agrees with the
//! brute-force ground truth where it promises to, and the orchestrator routes
//! real index searches correctly.

use std::collections::HashSet;

use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use wave_core::vectorized::{brute_force_knn, linear_range};
use wave_core::{
    AccelerationStats, DEFAULT_BUCKET_WIDTH, KdTree4D, LshIndex, Neighbor,
    OptimizationOrchestrator, OrchestratorConfig, Point4, QueryPath, export_stats_json,
};

fn rng() -> SmallRng {
    SmallRng::seed_from_u64(42)
}

fn random_points(n: usize, lo: f64, hi: f64, rng: &mut SmallRng) -> Vec<Point4> {
    (0..n).map(|_| Point4::random_in_cube(lo, hi, rng)).collect()
}

fn indexed_tree(points: &[Point4]) -> KdTree4D<usize> {
    KdTree4D::build(points.iter().enumerate().map(|(i, p)| (*p, i)).collect())
}

fn lsh_over(points: &[Point4], num_tables: u32, bucket_width: f64, seed: u64) -> LshIndex<usize> {
    let mut lsh = LshIndex::with_seed(num_tables, bucket_width, 4, seed).unwrap();
    for (i, p) in points.iter().enumerate() {
        lsh.add(&p.to_array(), i).unwrap();
    }
    lsh
}

/// Average fraction of the true top-5 found in the LSH top-20.
fn lsh_recall(points: &[Point4], queries: &[Point4], lsh: &LshIndex<usize>) -> f64 {
    let total: f64 = queries
        .iter()
        .map(|q| {
            let truth: HashSet<usize> = brute_force_knn(points, *q, 5)
                .into_iter()
                .map(|(i, _)| i)
                .collect();
            let found: HashSet<usize> = lsh
                .query(&q.to_array(), 20)
                .unwrap()
                .into_iter()
                .map(|n| n.data)
                .collect();
            truth.intersection(&found).count() as f64 / truth.len() as f64
        })
        .sum();
    total / queries.len() as f64
}

#[test]
fn kd_tree_knn_is_exact_on_1000_points() {
    let mut rng = rng();
    let points = random_points(1000, 0.0, 1.0, &mut rng);
    let tree = indexed_tree(&points);

    for _ in 0..100 {
        let q = Point4::random_in_cube(0.0, 1.0, &mut rng);
        let got = tree.nearest_neighbors(q, 10, None);
        let want = brute_force_knn(&points, q, 10);

        let got_ids: HashSet<usize> = got.iter().map(|n| n.data).collect();
        let want_ids: HashSet<usize> = want.iter().map(|(i, _)| *i).collect();
        assert_eq!(got_ids, want_ids);
        for (g, (_, d)) in got.iter().zip(&want) {
            assert_abs_diff_eq!(g.distance, *d, epsilon = 1e-6);
        }
    }
}

#[test]
fn kd_tree_range_matches_linear_filter() {
    let mut rng = rng();
    let points = random_points(1000, 0.0, 1.0, &mut rng);
    let tree = indexed_tree(&points);

    for r in [0.05, 0.1, 0.2, 0.35] {
        let center = Point4::random_in_cube(0.0, 1.0, &mut rng);
        let got: HashSet<usize> = tree.range_query(center, r).iter().map(|n| n.data).collect();
        let want: HashSet<usize> = linear_range(&points, center, r)
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(got, want, "radius {r}");
    }
}

#[test]
fn kd_tree_scenario_abc() {
    let tree = KdTree4D::build(vec![
        (Point4::new(0.0, 0.0, 0.0, 0.0), "A"),
        (Point4::new(1.0, 1.0, 1.0, 1.0), "B"),
        (Point4::new(5.0, 5.0, 5.0, 5.0), "C"),
    ]);
    let result = tree.nearest_neighbors(Point4::new(0.1, 0.1, 0.1, 0.1), 1, None);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].data, "A");
    assert_abs_diff_eq!(result[0].distance, 0.2, epsilon = 1e-9);
}

#[test]
fn lsh_recall_floor_with_five_tables() {
    let mut rng = rng();
    let points = random_points(1000, 0.0, 1.0, &mut rng);
    let queries = random_points(100, 0.0, 1.0, &mut rng);
    let lsh = lsh_over(&points, 5, DEFAULT_BUCKET_WIDTH, 7);

    let recall = lsh_recall(&points, &queries, &lsh);
    assert!(recall > 0.8, "recall {recall} below floor");

    // Recall must come from bucketing, not from scanning most of the index.
    let avg_candidates = queries
        .iter()
        .map(|q| lsh.candidate_count(&q.to_array()).unwrap())
        .sum::<usize>() as f64
        / queries.len() as f64;
    assert!(
        avg_candidates < 0.4 * points.len() as f64,
        "queries touch {avg_candidates} of {} points on average",
        points.len()
    );
}

#[test]
fn lsh_more_tables_never_lowers_recall() {
    let mut rng = rng();
    let points = random_points(1000, 0.0, 1.0, &mut rng);
    let queries = random_points(100, 0.0, 1.0, &mut rng);

    let mut last = 0.0;
    for tables in [1, 2, 5, 10] {
        let recall = lsh_recall(&points, &queries, &lsh_over(&points, tables, 0.5, 7));
        assert!(
            recall >= last,
            "recall dropped from {last} to {recall} at {tables} tables"
        );
        last = recall;
    }
}

#[test]
fn lsh_empty_result_falls_back_to_exact() {
    let mut rng = rng();
    let points = random_points(200, 0.0, 1.0, &mut rng);
    let tree = indexed_tree(&points);
    // Tiny buckets: a far-away query collides with nothing.
    let lsh = lsh_over(&points, 3, 0.01, 3);
    let q = Point4::new(50.0, 50.0, 50.0, 50.0);

    let approx = lsh.query(&q.to_array(), 5).unwrap();
    let answer = if approx.is_empty() {
        tree.nearest_neighbors(q, 5, None)
    } else {
        approx
    };
    assert_eq!(answer.len(), 5);
    let truth: Vec<usize> = brute_force_knn(&points, q, 5).into_iter().map(|(i, _)| i).collect();
    assert_eq!(answer.iter().map(|n| n.data).collect::<Vec<_>>(), truth);
}

#[test]
fn orchestrator_routes_kd_tree_search() {
    let mut rng = rng();
    let points = random_points(300, -5.0, 5.0, &mut rng);
    let tree = indexed_tree(&points);

    let mut orch: OptimizationOrchestrator<Vec<Neighbor<usize>>> =
        OptimizationOrchestrator::new(&OrchestratorConfig {
            expected_items: 1000,
            false_positive_rate: 0.01,
            cache_size: 64,
        })
        .unwrap();
    orch.admit_all(&points);

    let search = |q: Point4, k: usize| tree.nearest_neighbors(q, k, None);

    let q = points[17];
    let first = orch.optimize_query(q, 4, search, true);
    assert_eq!(first.path, QueryPath::Computed);
    assert_eq!(first.value[0].data, 17);
    assert_eq!(first.value.len(), 4);

    let second = orch.optimize_query(q, 4, search, true);
    assert_eq!(second.path, QueryPath::CacheHit);
    assert_eq!(second.value, first.value);

    let unknown = Point4::new(100.0, 100.0, 100.0, 100.0);
    let rejected = orch.optimize_query(unknown, 4, search, true);
    assert_eq!(rejected.path, QueryPath::BloomRejected);
    assert!(rejected.value.is_empty());

    let stats = AccelerationStats::collect(&orch, None::<&LshIndex<usize>>, Some(&tree));
    let json = export_stats_json(&stats).unwrap();
    assert!(json.contains("\"hit_rate\""));
    assert!(json.contains("\"fill_ratio\""));
}
