//! Stats export for the monitoring dashboard.
//!
//! Field names are part of the dashboard contract: renaming one is a breaking
//! change for consumers.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::kdtree::{KdTree4D, KdTreeStats};
use crate::lsh::{LshIndex, LshStats};
use crate::orchestrator::{OptimizationOrchestrator, OrchestratorStats};
use crate::time::now_unix_secs;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccelerationStats {
    pub generated_at_unix: u64,
    pub orchestrator: OrchestratorStats,
    #[serde(default)]
    pub lsh: Option<LshStats>,
    #[serde(default)]
    pub kdtree: Option<KdTreeStats>,
}

impl AccelerationStats {
    /// Snapshot the orchestrator and whichever indexes are built.
    pub fn collect<V: Clone + Default, A, B>(
        orchestrator: &OptimizationOrchestrator<V>,
        lsh: Option<&LshIndex<A>>,
        kdtree: Option<&KdTree4D<B>>,
    ) -> Self {
        Self {
            generated_at_unix: now_unix_secs(),
            orchestrator: orchestrator.stats(),
            lsh: lsh.map(LshIndex::stats),
            kdtree: kdtree.map(KdTree4D::stats),
        }
    }
}

/// Serialize to pretty-printed JSON.
pub fn export_stats_json(stats: &AccelerationStats) -> Result<String> {
    Ok(serde_json::to_string_pretty(stats)?)
}
