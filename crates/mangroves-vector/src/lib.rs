//! # mangroves-vector
//!
//! Vector reference data for mangrove processing:
//! - Global Mangrove Watch (GMW) extent polygons
//! - Country boundaries (GADM, filtered by `GID_0`)
//! - Grid cell polygons used to clip GMW
//!
//! Sources are GeoJSON FeatureCollections read from disk or fetched over
//! HTTP(S) and cached locally. Layers can be reprojected between EPSG:4326
//! and the Pacific grid CRS, indexed with an R-tree, and clipped.
//!
//! ## Example
//!
//! ```no_run
//! use mangroves_vector::{PolygonIndex, PolygonLayer, SourceFetcher};
//! use mangroves_grid::{PACIFIC_EPSG, PACIFIC_GRID_10, TileIndex};
//!
//! let fetcher = SourceFetcher::new("./cache")?;
//! let gmw = PolygonLayer::from_file(fetcher.fetch("data/gmw_pacific.geojson")?)?
//!     .to_crs(PACIFIC_EPSG)?;
//! let index = PolygonIndex::new(gmw);
//!
//! let extent = PACIFIC_GRID_10.tile_extent(TileIndex::new(66, 21));
//! println!("Tile has mangroves: {}", index.intersects_bbox(&extent));
//! # Ok::<(), mangroves_vector::VectorError>(())
//! ```

mod clip;
mod error;
mod index;
mod layer;
mod source;

pub use clip::clip_to_cells;
pub use error::VectorError;
pub use index::PolygonIndex;
pub use layer::{PolygonLayer, COUNTRY_CODE_PROPERTY};
pub use source::{is_remote, DownloadStats, SourceFetcher};

/// Result type for vector operations.
pub type Result<T> = std::result::Result<T, VectorError>;

/// Load a polygon layer from a local path or URL.
pub fn load_layer(fetcher: &SourceFetcher, location: &str) -> Result<PolygonLayer> {
    let text = fetcher.read_to_string(location)?;
    PolygonLayer::from_geojson_str(&text, location)
}
