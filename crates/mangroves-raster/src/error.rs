//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when reading, writing or processing rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF encode or decode error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing required tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Unsupported data type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// Grid or projection error.
    #[error("Grid error: {0}")]
    Grid(#[from] mangroves_grid::GridError),

    /// No transform between the two CRSs.
    #[error("Cannot reproject from EPSG:{from} to EPSG:{to}")]
    UnsupportedReprojection {
        /// Source EPSG code.
        from: u32,
        /// Target EPSG code.
        to: u32,
    },

    /// Bands that must share a pixel grid do not.
    #[error("Band '{band}' is {actual_width}x{actual_height}, expected {width}x{height} on the same grid")]
    GridMismatch {
        /// Name of the offending band.
        band: String,
        /// Expected width.
        width: u32,
        /// Expected height.
        height: u32,
        /// Actual width.
        actual_width: u32,
        /// Actual height.
        actual_height: u32,
    },

    /// Data length does not match the declared shape.
    #[error("Expected {expected} samples, got {actual}")]
    ShapeMismatch {
        /// Expected number of samples.
        expected: usize,
        /// Actual number of samples.
        actual: usize,
    },
}
