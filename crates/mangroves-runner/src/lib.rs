//! # mangroves-runner
//!
//! Command-line orchestration of mangrove classification over the Pacific grid.
//!
//! The `mangroves` binary has three subcommands:
//! - `clip-gmw`: reproject Global Mangrove Watch polygons and clip them to grid cells
//! - `print-tasks`: list `(tile, year)` tasks as JSON, skipping finished ones
//! - `run-task`: classify one tile and publish a GeoTIFF plus STAC item
//!
//! The library exposes the same steps so they can be driven from tests.

pub mod clip;
pub mod cluster;
pub mod config;
mod error;
pub mod run_log;
pub mod run_task;
pub mod tasks;

pub use clip::clip_gmw;
pub use cluster::ClusterSettings;
pub use config::Config;
pub use error::RunnerError;
pub use run_task::{run_task, ItemSource, RunTaskArgs, StacItemSource, TaskOutcome};
pub use tasks::Task;

use mangroves_grid::PACIFIC_EPSG;
use mangroves_store::{LocalStore, ObjectStore, S3Store};
use mangroves_vector::{load_layer, PolygonIndex, SourceFetcher};
use tracing::info;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Output store: the S3 bucket when given, else the configured local root.
pub fn open_store(bucket: Option<&str>, config: &Config) -> Result<Option<Box<dyn ObjectStore>>> {
    if let Some(bucket) = bucket {
        let store: Box<dyn ObjectStore> = Box::new(S3Store::from_env(bucket, &config.region)?);
        info!(bucket, region = %config.region, "Writing outputs to S3");
        return Ok(Some(store));
    }
    match &config.output_root {
        Some(root) => {
            info!(root = %root.display(), "Writing outputs to local directory");
            let store: Box<dyn ObjectStore> = Box::new(LocalStore::new(root));
            Ok(Some(store))
        }
        None => Ok(None),
    }
}

/// Clipped GMW polygons, indexed in the grid CRS.
pub fn load_gmw_index(fetcher: &SourceFetcher, config: &Config) -> Result<PolygonIndex> {
    let layer = load_layer(fetcher, &config.gmw_source)?.to_crs(PACIFIC_EPSG)?;
    info!(polygons = layer.len(), "Loaded GMW areas");
    Ok(PolygonIndex::new(layer))
}
