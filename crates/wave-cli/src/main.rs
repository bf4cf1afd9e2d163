mod config;
mod points;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use wave_core::vectorized::{brute_force_knn, linear_range};
use wave_core::{
    AccelerationStats, KdTree4D, LshIndex, Neighbor, OptimizationOrchestrator, Point4,
    export_stats_json,
};

use crate::config::WaveConfig;
use crate::points::{load_points, random_points};

type Results = Vec<Neighbor<String>>;

#[derive(Parser)]
#[command(name = "wave", about = "4D similarity search with Bloom, LRU, LSH and KD-tree tiers")]
struct Cli {
    /// Config file (TOML). Falls back to WAVE_CONFIG, then defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Exact KD-tree search
    Kd,
    /// Approximate LSH search with exact fallback on an empty result
    Lsh,
    /// Brute-force scan
    Linear,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one query over a JSON point file
    Query {
        /// JSON file: [{"label": "...", "coords": [x, y, z, w]}, ...]
        #[arg(long)]
        points: PathBuf,

        /// Number of neighbors
        #[arg(long, default_value_t = 5)]
        k: usize,

        #[arg(long, value_enum, default_value_t = Strategy::Kd)]
        strategy: Strategy,

        /// Return every point within this distance instead of the k nearest
        #[arg(long)]
        radius: Option<f64>,

        /// Query coordinates: X Y Z W
        #[arg(num_args = 4, required = true, allow_negative_numbers = true)]
        coords: Vec<f64>,
    },

    /// Measure KD exactness, LSH recall and cache behavior on random data
    Bench {
        #[arg(long, default_value_t = 1000)]
        points: usize,

        #[arg(long, default_value_t = 100)]
        queries: usize,

        #[arg(long, default_value_t = 5)]
        k: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Build indexes over random data, run a warm-up workload, export stats JSON
    Stats {
        #[arg(long, default_value_t = 1000)]
        points: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = WaveConfig::resolve(cli.config.as_deref())?;

    match &cli.command {
        Commands::Query {
            points,
            k,
            strategy,
            radius,
            coords,
        } => cmd_query(&config, points, *k, *strategy, *radius, coords),
        Commands::Bench {
            points,
            queries,
            k,
            seed,
        } => cmd_bench(&config, *points, *queries, *k, *seed),
        Commands::Stats { points, seed, out } => {
            cmd_stats(&config, *points, *seed, out.as_deref())
        }
    }
}

// ---------------------------------------------------------------------------
// Index construction
// ---------------------------------------------------------------------------

struct Indexes {
    points: Vec<Point4>,
    labels: Vec<String>,
    tree: KdTree4D<String>,
    lsh: LshIndex<String>,
}

impl Indexes {
    fn build(config: &WaveConfig, data: Vec<(Point4, String)>) -> Result<Self> {
        let mut lsh = LshIndex::with_seed(
            config.lsh.num_tables,
            config.lsh.bucket_width,
            wave_core::DIMS as u32,
            config.lsh.seed,
        )
        .context("failed to create LSH index")?;
        for (p, label) in &data {
            lsh.add(&p.to_array(), label.clone())?;
        }
        let (points, labels): (Vec<Point4>, Vec<String>) = data.iter().cloned().unzip();
        let tree = KdTree4D::build(data);
        tracing::info!("indexed {} points", points.len());
        Ok(Self {
            points,
            labels,
            tree,
            lsh,
        })
    }

    fn linear(&self, q: Point4, k: usize) -> Results {
        brute_force_knn(&self.points, q, k)
            .into_iter()
            .map(|(i, d)| Neighbor::new(self.labels[i].clone(), d))
            .collect()
    }

    fn search(&self, strategy: Strategy, q: Point4, k: usize) -> Results {
        match strategy {
            Strategy::Kd => self.tree.nearest_neighbors(q, k, None),
            Strategy::Linear => self.linear(q, k),
            Strategy::Lsh => match self.lsh.query(&q.to_array(), k) {
                Ok(found) if !found.is_empty() => found,
                Ok(_) => {
                    tracing::debug!("lsh returned no candidates, falling back to linear scan");
                    self.linear(q, k)
                }
                Err(e) => {
                    tracing::warn!("lsh query failed: {e}");
                    self.linear(q, k)
                }
            },
        }
    }

    fn orchestrator(&self, config: &WaveConfig) -> Result<OptimizationOrchestrator<Results>> {
        let mut orch = OptimizationOrchestrator::new(&config.orchestrator())
            .context("failed to create orchestrator")?;
        orch.admit_all(&self.points);
        Ok(orch)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_query(
    config: &WaveConfig,
    points_path: &Path,
    k: usize,
    strategy: Strategy,
    radius: Option<f64>,
    coords: &[f64],
) -> Result<()> {
    let query = Point4::from_slice(coords).context("query must have 4 coordinates")?;
    let data = load_points(points_path)?;
    let indexes = Indexes::build(config, data)?;

    let results = match radius {
        Some(r) => match strategy {
            Strategy::Kd => indexes.tree.range_query(query, r),
            Strategy::Linear => linear_range(&indexes.points, query, r)
                .into_iter()
                .map(|(i, d)| Neighbor::new(indexes.labels[i].clone(), d))
                .collect(),
            Strategy::Lsh => bail!("range queries need an exact strategy (kd or linear)"),
        },
        None => {
            let mut orch = indexes.orchestrator(config)?;
            // A query typed on the command line is a real request.
            orch.admit(query);
            let outcome = orch.optimize_query(
                query,
                k,
                |q, k| indexes.search(strategy, q, k),
                strategy != Strategy::Lsh,
            );
            tracing::info!(
                "answered via {:?} in {:.3}ms",
                outcome.path,
                outcome.compute_time_ms
            );
            outcome.value
        }
    };

    if results.is_empty() {
        println!("no results");
    }
    for n in &results {
        println!("{}\t{:.6}", n.data, n.distance);
    }
    Ok(())
}

fn cmd_bench(config: &WaveConfig, n: usize, queries: usize, k: usize, seed: u64) -> Result<()> {
    if n == 0 || queries == 0 || k == 0 {
        bail!("points, queries and k must all be positive");
    }
    let indexes = Indexes::build(config, random_points(n, seed))?;
    let probes: Vec<Point4> = random_points(queries, seed.wrapping_add(1))
        .into_iter()
        .map(|(p, _)| p)
        .collect();

    let mut kd_mismatches = 0usize;
    let mut recall_sum = 0.0;
    for q in &probes {
        let truth: Vec<String> = indexes.linear(*q, k).into_iter().map(|n| n.data).collect();
        let kd: Vec<String> = indexes
            .tree
            .nearest_neighbors(*q, k, None)
            .into_iter()
            .map(|n| n.data)
            .collect();
        if kd != truth {
            kd_mismatches += 1;
        }

        let truth_set: HashSet<&String> = truth.iter().collect();
        let found = indexes.lsh.query(&q.to_array(), k * 4)?;
        let hit = found.iter().filter(|n| truth_set.contains(&n.data)).count();
        recall_sum += hit as f64 / truth.len() as f64;
    }

    // Each indexed point is queried twice: the second pass must come from cache.
    let mut orch = indexes.orchestrator(config)?;
    let workload = indexes.points.iter().take(queries);
    for p in workload.clone().chain(workload) {
        orch.optimize_query(*p, k, |q, k| indexes.search(Strategy::Kd, q, k), true);
    }
    for q in &probes {
        orch.optimize_query(*q, k, |q, k| indexes.search(Strategy::Kd, q, k), true);
    }
    let stats = orch.stats();

    println!("points:           {n}");
    println!("queries:          {queries}");
    println!("k:                {k}");
    println!("kd_mismatches:    {kd_mismatches}");
    println!("lsh_recall:       {:.3}", recall_sum / probes.len() as f64);
    println!("cache_hit_rate:   {:.3}", stats.cache.hit_rate);
    println!("bloom_rejections: {}", stats.bloom_rejections);
    Ok(())
}

fn cmd_stats(config: &WaveConfig, n: usize, seed: u64, out: Option<&Path>) -> Result<()> {
    let indexes = Indexes::build(config, random_points(n, seed))?;
    let mut orch = indexes.orchestrator(config)?;
    for p in indexes.points.iter().chain(indexes.points.iter()) {
        orch.optimize_query(*p, 5, |q, k| indexes.search(Strategy::Kd, q, k), true);
    }

    let stats = AccelerationStats::collect(&orch, Some(&indexes.lsh), Some(&indexes.tree));
    let json = export_stats_json(&stats).context("failed to serialize stats")?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote stats to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
