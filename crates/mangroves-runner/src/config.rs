//! Runner configuration.
//!
//! Defaults can be overridden by a YAML file passed with `--config`:
//!
//! ```yaml
//! catalog: https://stac.digitalearthpacific.org
//! collection: dep_s2_geomad
//! region: us-west-2
//! gmw_source: data/gmw_pacific.geojson
//! gmw_raw_source: data/gmw_v3_2020_vec.geojson
//! grid_source: data/grid_gmw_v3_2020_vec.geojson
//! countries_source: data/gadm_pacific.geojson
//! cache_dir: .cache/mangroves
//! output_root: /data/outputs
//! ```
//!
//! Missing keys keep their defaults. `MANGROVES_OUTPUT_ROOT` overrides
//! `output_root`.

use crate::Result;
use mangroves_stac::{DEFAULT_CATALOG, DEFAULT_REGION, GEOMAD_COLLECTION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable selecting a local output directory.
pub const OUTPUT_ROOT_ENV: &str = "MANGROVES_OUTPUT_ROOT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// STAC API root for GeoMAD inputs.
    pub catalog: String,
    /// Input collection.
    pub collection: String,
    /// AWS region of the output bucket.
    pub region: String,
    /// Clipped GMW polygons (path or URL, GeoJSON).
    pub gmw_source: String,
    /// Unclipped GMW polygons for `clip-gmw`.
    pub gmw_raw_source: String,
    /// Grid cells used to clip GMW.
    pub grid_source: String,
    /// Country boundaries with a `GID_0` property.
    pub countries_source: String,
    /// Cache for downloaded sources and assets.
    pub cache_dir: PathBuf,
    /// Local output directory used when no bucket is given.
    pub output_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_CATALOG.to_string(),
            collection: GEOMAD_COLLECTION.to_string(),
            region: DEFAULT_REGION.to_string(),
            gmw_source: "data/gmw_pacific.geojson".to_string(),
            gmw_raw_source: "data/gmw_v3_2020_vec.geojson".to_string(),
            grid_source: "data/grid_gmw_v3_2020_vec.geojson".to_string(),
            countries_source: "data/gadm_pacific.geojson".to_string(),
            cache_dir: PathBuf::from(".cache/mangroves"),
            output_root: None,
        }
    }
}

impl Config {
    /// Parse a YAML config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&text)?;
        debug!(path = %path.as_ref().display(), "Loaded config");
        Ok(config)
    }

    /// Config from an optional file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Some(root) = std::env::var_os(OUTPUT_ROOT_ENV).filter(|v| !v.is_empty()) {
            self.output_root = Some(PathBuf::from(root));
        }
        self
    }
}
