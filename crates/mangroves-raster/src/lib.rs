//! # mangroves-raster
//!
//! Raster side of mangrove processing:
//! - [`Band`] and [`ClassifiedBand`] pixel buffers on a [`GeoBox`](mangroves_grid::GeoBox)
//! - GeoTIFF decoding (any numeric single band) and `int16` encoding
//! - Nearest-neighbour reprojection and first-valid mosaics
//! - Polygon masks and the NDVI [`MangrovesProcessor`]
//!
//! ## Example
//!
//! ```
//! use geo::{polygon, MultiPolygon};
//! use mangroves_grid::{GeoBox, GeoTransform, PACIFIC_EPSG};
//! use mangroves_raster::{Band, MangrovesProcessor};
//!
//! let geobox = GeoBox::new(2, 1, GeoTransform::new(0.0, 10.0, 10.0, -10.0), PACIFIC_EPSG);
//! let red = Band::new(geobox, vec![1000.0, 500.0])?;
//! let nir = Band::new(geobox, vec![3000.0, 5000.0])?;
//!
//! let areas = MultiPolygon::new(vec![polygon![
//!     (x: 0.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 10.0), (x: 0.0, y: 10.0),
//! ]]);
//! let classified = MangrovesProcessor::new(areas, 10000.0, 0.0).process(&red, &nir)?;
//! assert_eq!(classified.data, vec![1, 2]);
//! # Ok::<(), mangroves_raster::RasterError>(())
//! ```

mod band;
mod classify;
mod error;
pub mod geotiff;
mod mask;
mod resample;

pub use band::{Band, ClassifiedBand};
pub use classify::{
    classify_ndvi, ndvi, MangroveClass, MangrovesProcessor, CLOSED_THRESHOLD, OUTPUT_BAND,
    OUTPUT_NODATA, REGULAR_THRESHOLD,
};
pub use error::RasterError;
pub use mask::{apply_mask, rasterize};
pub use resample::{mosaic_first, reproject, reproject_and_mosaic};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;

/// Read a single-band GeoTIFF from disk.
pub fn read_band<P: AsRef<Path>>(path: P) -> Result<Band> {
    let file = File::open(path.as_ref())?;
    geotiff::decode(BufReader::new(file))
}
