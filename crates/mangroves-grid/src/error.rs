//! Error types for the grid crate.

use thiserror::Error;

/// Errors that can occur when working with the tiling grid.
#[derive(Debug, Error)]
pub enum GridError {
    /// Tile id string could not be parsed.
    #[error("Invalid tile id '{0}' (expected 'x,y')")]
    InvalidTileId(String),

    /// Coordinate reference system is not one the grid can transform.
    #[error("Unsupported CRS EPSG:{0}")]
    UnsupportedCrs(u32),

    /// Zoom factor must be at least 1.
    #[error("Invalid zoom factor {0} (must be >= 1)")]
    InvalidZoomFactor(u32),
}
