//! Worker pool settings.

use crate::{Result, RunnerError};
use serde::Deserialize;
use tracing::{info, warn};

/// Sizing of the local worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    pub n_workers: usize,
    pub threads_per_worker: usize,
    /// Memory budget, e.g. `50GB`.
    pub memory_limit: String,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            n_workers: 2,
            threads_per_worker: 32,
            memory_limit: "50GB".to_string(),
        }
    }
}

/// Keys accepted in `--local-cluster-kwargs`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClusterOverrides {
    n_workers: Option<usize>,
    threads_per_worker: Option<usize>,
    memory_limit: Option<String>,
}

impl ClusterSettings {
    /// Override fields from a JSON object such as
    /// `{"n_workers": 4, "memory_limit": "16GB"}`.
    pub fn apply_json(mut self, json: &str) -> Result<Self> {
        let overrides: ClusterOverrides = serde_json::from_str(json)
            .map_err(|e| RunnerError::InvalidClusterSettings(e.to_string()))?;

        if let Some(n) = overrides.n_workers {
            self.n_workers = n;
        }
        if let Some(n) = overrides.threads_per_worker {
            self.threads_per_worker = n;
        }
        if let Some(limit) = overrides.memory_limit {
            self.memory_limit = limit;
        }
        Ok(self)
    }

    /// Total threads in the pool, at least one.
    pub fn total_threads(&self) -> usize {
        (self.n_workers * self.threads_per_worker).max(1)
    }

    /// Memory limit in bytes.
    pub fn memory_limit_bytes(&self) -> Result<u64> {
        parse_memory_limit(&self.memory_limit)
    }

    /// Build the rayon pool used for raster processing.
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        let threads = self.total_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mangroves-worker-{i}"))
            .build()?;

        info!(
            "Started worker pool with {} workers and {} threads with {} memory",
            self.n_workers, self.threads_per_worker, self.memory_limit
        );
        Ok(pool)
    }

    /// Warn when an estimated working set exceeds the memory limit.
    pub fn check_memory(&self, estimated_bytes: u64) -> Result<()> {
        let limit = self.memory_limit_bytes()?;
        if estimated_bytes > limit {
            warn!(
                estimated_mb = estimated_bytes / 1_000_000,
                limit_mb = limit / 1_000_000,
                "Estimated working set exceeds memory limit"
            );
        }
        Ok(())
    }
}

/// Parse sizes like `50GB`, `512 MB`, `1.5TB` or a plain byte count.
///
/// Units are decimal (1 GB = 10^9 bytes); `KiB`/`MiB`/`GiB`/`TiB` are binary.
pub fn parse_memory_limit(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| RunnerError::InvalidMemoryLimit(s.to_string()))?;
    let multiplier: f64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "KB" | "K" => 1e3,
        "MB" | "M" => 1e6,
        "GB" | "G" => 1e9,
        "TB" | "T" => 1e12,
        "KIB" => 1024.0,
        "MIB" => 1024.0 * 1024.0,
        "GIB" => 1024.0 * 1024.0 * 1024.0,
        "TIB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return Err(RunnerError::InvalidMemoryLimit(s.to_string())),
    };

    Ok((value * multiplier) as u64)
}

/// Rough working set of classifying one tile from `items` inputs.
///
/// Each input contributes two reprojected `f32` bands; processing adds two
/// scaled copies, a mask and the `i16` output.
pub fn estimate_tile_bytes(pixels: usize, items: usize) -> u64 {
    let per_pixel = 8 * items as u64 + 8 + 1 + 2;
    pixels as u64 * per_pixel
}
