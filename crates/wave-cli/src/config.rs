//! TOML configuration for the CLI.
//!
//! Resolution order: `--config PATH`, then `WAVE_CONFIG`, then built-in
//! defaults. Every key is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wave_core::{
    DEFAULT_BUCKET_WIDTH, DEFAULT_CACHE_SIZE, DEFAULT_EXPECTED_ITEMS, DEFAULT_FALSE_POSITIVE_RATE,
    DEFAULT_NUM_TABLES, OrchestratorConfig,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub bloom: BloomSection,
    pub cache: CacheSection,
    pub lsh: LshSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSection {
    pub expected_items: u64,
    pub false_positive_rate: f64,
}

impl Default for BloomSection {
    fn default() -> Self {
        Self {
            expected_items: DEFAULT_EXPECTED_ITEMS,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub max_size: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_CACHE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LshSection {
    pub num_tables: u32,
    pub bucket_width: f64,
    pub seed: u64,
}

impl Default for LshSection {
    fn default() -> Self {
        Self {
            num_tables: DEFAULT_NUM_TABLES,
            bucket_width: DEFAULT_BUCKET_WIDTH,
            seed: 42,
        }
    }
}

impl WaveConfig {
    /// Load from `explicit`, else from `WAVE_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("WAVE_CONFIG").ok().map(PathBuf::from));
        match path {
            Some(p) => Self::load(&p),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            expected_items: self.bloom.expected_items,
            false_positive_rate: self.bloom.false_positive_rate,
            cache_size: self.cache.max_size,
        }
    }
}
