//! Error types for the runner.

use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Grid(#[from] mangroves_grid::GridError),

    #[error(transparent)]
    Vector(#[from] mangroves_vector::VectorError),

    #[error(transparent)]
    Raster(#[from] mangroves_raster::RasterError),

    #[error(transparent)]
    Stac(#[from] mangroves_stac::StacError),

    #[error(transparent)]
    Store(#[from] mangroves_store::StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run log could not be read or written.
    #[error("Run log error: {0}")]
    RunLog(#[from] csv::Error),

    /// `--years` is not `YYYY` or `YYYY-YYYY`.
    #[error("{0} is not a valid value for --years")]
    InvalidYears(String),

    /// Memory limit is not a size like `50GB`.
    #[error("Invalid memory limit '{0}': expected a size such as 500MB or 50GB")]
    InvalidMemoryLimit(String),

    /// `--local-cluster-kwargs` is not a JSON object of known settings.
    #[error("Invalid cluster settings: {0}")]
    InvalidClusterSettings(String),

    /// Worker pool could not be started.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Neither `--tile-id` nor `--region-code`/`--region-index` was given.
    #[error("Either --tile-id or both --region-code and --region-index are required")]
    MissingTileId,

    /// No bucket and no local output root.
    #[error("No output store: pass --output-bucket or set MANGROVES_OUTPUT_ROOT")]
    NoOutputStore,

    /// A found item lacks a required band.
    #[error("Item {item} has no '{asset}' asset")]
    MissingAsset {
        /// Item id.
        item: String,
        /// Asset key.
        asset: String,
    },
}
