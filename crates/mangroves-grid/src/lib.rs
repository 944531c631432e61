//! # mangroves-grid
//!
//! The Pacific tiling grid used to partition mangrove processing work.
//!
//! This crate provides:
//! - The PDC Mercator projection (EPSG:3832) and its inverse
//! - [`GridSpec`] definitions, with [`PACIFIC_GRID_10`] as the production grid
//! - [`TileIndex`] tile ids (`"x,y"` strings on the command line)
//! - [`GeoBox`] pixel grids for individual tiles
//!
//! ## Example
//!
//! ```
//! use mangroves_grid::{Mercator, TileIndex, PACIFIC_GRID_10};
//!
//! // Which tile covers Suva?
//! let (x, y) = Mercator::pacific().forward(178.4419, -18.1416);
//! let tile = PACIFIC_GRID_10.tile_of(x, y);
//!
//! let geobox = PACIFIC_GRID_10.tile_geobox(tile);
//! assert_eq!(geobox.shape(), (9600, 9600));
//!
//! let parsed: TileIndex = tile.to_string().parse()?;
//! assert_eq!(parsed, tile);
//! # Ok::<(), mangroves_grid::GridError>(())
//! ```

mod error;
mod gridspec;
mod projection;

pub use error::GridError;
pub use gridspec::{BoundingBox, GeoBox, GeoTransform, GridSpec, TileIndex, PACIFIC_GRID_10};
pub use projection::{
    wrap_longitude, Mercator, PACIFIC_CENTRAL_MERIDIAN, PACIFIC_EPSG, WGS84_EPSG,
};

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
