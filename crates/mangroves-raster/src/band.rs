//! In-memory raster bands.

use crate::{RasterError, Result};
use mangroves_grid::GeoBox;

/// A single floating-point band on a pixel grid.
///
/// Samples are row-major, north to south. `NaN` marks no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    geobox: GeoBox,
    data: Vec<f32>,
}

impl Band {
    /// Wrap samples, checking the length against the geobox.
    pub fn new(geobox: GeoBox, data: Vec<f32>) -> Result<Self> {
        if data.len() != geobox.len() {
            return Err(RasterError::ShapeMismatch {
                expected: geobox.len(),
                actual: data.len(),
            });
        }
        Ok(Self { geobox, data })
    }

    /// A band of no-data.
    pub fn empty(geobox: GeoBox) -> Self {
        Self {
            data: vec![f32::NAN; geobox.len()],
            geobox,
        }
    }

    pub fn geobox(&self) -> &GeoBox {
        &self.geobox
    }

    pub fn width(&self) -> u32 {
        self.geobox.width
    }

    pub fn height(&self) -> u32 {
        self.geobox.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Sample at `(col, row)`, or `None` outside the grid.
    pub fn get(&self, col: u32, row: u32) -> Option<f32> {
        if col >= self.geobox.width || row >= self.geobox.height {
            return None;
        }
        Some(self.data[row as usize * self.geobox.width as usize + col as usize])
    }

    /// Number of samples that are not `NaN`.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Check that another band sits on exactly the same pixel grid.
    pub fn check_same_grid(&self, name: &str, other: &Band) -> Result<()> {
        if self.geobox != other.geobox {
            return Err(RasterError::GridMismatch {
                band: name.to_string(),
                width: self.geobox.width,
                height: self.geobox.height,
                actual_width: other.geobox.width,
                actual_height: other.geobox.height,
            });
        }
        Ok(())
    }
}

/// A classified `int16` band with an explicit no-data value.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedBand {
    /// Band name, used as the asset name of the output.
    pub name: String,
    pub geobox: GeoBox,
    pub data: Vec<i16>,
    pub nodata: i16,
}

impl ClassifiedBand {
    /// Count of pixels per value, excluding no-data. Sorted by value.
    pub fn class_counts(&self) -> Vec<(i16, usize)> {
        let mut counts = std::collections::BTreeMap::new();
        for &v in self.data.iter().filter(|&&v| v != self.nodata) {
            *counts.entry(v).or_insert(0usize) += 1;
        }
        counts.into_iter().collect()
    }

    /// Encode as a deflate-compressed GeoTIFF.
    pub fn to_geotiff(&self) -> Result<Vec<u8>> {
        crate::geotiff::encode_i16_to_vec(&self.geobox, &self.data, self.nodata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangroves_grid::{GeoTransform, PACIFIC_EPSG};

    fn geobox(width: u32, height: u32) -> GeoBox {
        GeoBox::new(width, height, GeoTransform::new(0.0, 100.0, 10.0, -10.0), PACIFIC_EPSG)
    }

    #[test]
    fn test_band_rejects_wrong_length() {
        assert!(Band::new(geobox(2, 2), vec![0.0; 3]).is_err());
        assert!(Band::new(geobox(2, 2), vec![0.0; 4]).is_ok());
    }

    #[test]
    fn test_band_get() {
        let band = Band::new(geobox(3, 2), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).expect("valid band");
        assert_eq!(band.get(0, 0), Some(0.0));
        assert_eq!(band.get(2, 1), Some(5.0));
        assert_eq!(band.get(3, 0), None);
        assert_eq!(band.get(0, 2), None);
    }

    #[test]
    fn test_empty_band_has_no_valid_pixels() {
        let band = Band::empty(geobox(4, 4));
        assert_eq!(band.valid_count(), 0);
    }

    #[test]
    fn test_grid_mismatch() {
        let a = Band::empty(geobox(4, 4));
        let b = Band::empty(geobox(4, 5));
        assert!(a.check_same_grid("nir", &a.clone()).is_ok());
        assert!(matches!(
            a.check_same_grid("nir", &b),
            Err(RasterError::GridMismatch { .. })
        ));
    }

    #[test]
    fn test_class_counts_skip_nodata() {
        let band = ClassifiedBand {
            name: "mangroves".to_string(),
            geobox: geobox(3, 2),
            data: vec![0, 1, 1, 2, -32767, -32767],
            nodata: -32767,
        };
        assert_eq!(band.class_counts(), vec![(0, 1), (1, 2), (2, 1)]);
    }
}
