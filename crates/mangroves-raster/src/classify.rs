//! NDVI-based mangrove classification.

use crate::mask::{apply_mask, rasterize};
use crate::{Band, ClassifiedBand, Result};
use geo::MultiPolygon;
use rayon::prelude::*;
use tracing::{debug, info};

/// No-data value of the classified output.
pub const OUTPUT_NODATA: i16 = -32767;

/// Name of the classified band and its output asset.
pub const OUTPUT_BAND: &str = "mangroves";

/// NDVI above this is mangrove.
pub const REGULAR_THRESHOLD: f64 = 0.4;

/// NDVI above this is closed-canopy mangrove.
pub const CLOSED_THRESHOLD: f64 = 0.7;

/// Mangrove classes written to the output band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum MangroveClass {
    NotMangrove = 0,
    Regular = 1,
    Closed = 2,
}

impl MangroveClass {
    /// Class for an NDVI value, or `None` for `NaN`.
    pub fn from_ndvi(ndvi: f64) -> Option<Self> {
        if ndvi.is_nan() {
            None
        } else if ndvi > CLOSED_THRESHOLD {
            Some(MangroveClass::Closed)
        } else if ndvi > REGULAR_THRESHOLD {
            Some(MangroveClass::Regular)
        } else {
            Some(MangroveClass::NotMangrove)
        }
    }
}

/// Classify one NDVI value into an output sample.
pub fn classify_ndvi(ndvi: f64) -> i16 {
    MangroveClass::from_ndvi(ndvi).map_or(OUTPUT_NODATA, |c| c as i16)
}

/// NDVI from red and NIR reflectance. `NaN` when either input is `NaN`
/// or the sum is zero.
pub fn ndvi(red: f64, nir: f64) -> f64 {
    let sum = nir + red;
    if sum == 0.0 {
        return f64::NAN;
    }
    (nir - red) / sum
}

/// Scale a raw sample to reflectance, clipped to `[0, 1]`.
///
/// Bands are stored as `f32`; scaling and NDVI run in `f64` so values near
/// a threshold classify the same as a double-precision pipeline.
fn scale_reflectance(v: f32, multiplier: f64, offset: f64) -> f64 {
    (f64::from(v) * multiplier + offset).clamp(0.0, 1.0)
}

/// Turns GeoMAD red and NIR bands into a classified mangrove band.
#[derive(Debug, Clone)]
pub struct MangrovesProcessor {
    areas: MultiPolygon<f64>,
    scale: f32,
    offset: f32,
}

impl MangrovesProcessor {
    /// Processor for mangrove `areas` (in the grid CRS of the bands).
    ///
    /// Raw samples become reflectance via `v * (1 / scale) + offset`.
    pub fn new(areas: MultiPolygon<f64>, scale: f32, offset: f32) -> Self {
        Self {
            areas,
            scale,
            offset,
        }
    }

    pub fn areas(&self) -> &MultiPolygon<f64> {
        &self.areas
    }

    /// Classify `red` and `nir`, which must share a grid.
    pub fn process(&self, red: &Band, nir: &Band) -> Result<ClassifiedBand> {
        red.check_same_grid("nir", nir)?;
        let geobox = *red.geobox();

        let mut red_data = red.data().to_vec();
        let mut nir_data = nir.data().to_vec();

        // Masked samples become NaN, which survives scaling
        let mask = rasterize(&geobox, &self.areas);
        apply_mask(&mut red_data, &mask);
        apply_mask(&mut nir_data, &mask);
        debug!(
            masked_in = mask.iter().filter(|&&m| m).count(),
            total = mask.len(),
            "Masked bands to mangrove areas"
        );

        let multiplier = 1.0 / f64::from(self.scale);
        let offset = f64::from(self.offset);
        let width = geobox.width.max(1) as usize;
        let mut data = vec![OUTPUT_NODATA; geobox.len()];
        data.par_chunks_mut(width)
            .zip(red_data.par_chunks(width).zip(nir_data.par_chunks(width)))
            .for_each(|(out, (red_row, nir_row))| {
                for ((o, &r), &n) in out.iter_mut().zip(red_row).zip(nir_row) {
                    let red = scale_reflectance(r, multiplier, offset);
                    let nir = scale_reflectance(n, multiplier, offset);
                    *o = classify_ndvi(ndvi(red, nir));
                }
            });

        let classified = ClassifiedBand {
            name: OUTPUT_BAND.to_string(),
            geobox,
            data,
            nodata: OUTPUT_NODATA,
        };
        info!(counts = ?classified.class_counts(), "Classified mangroves");
        Ok(classified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Polygon};
    use mangroves_grid::{GeoBox, GeoTransform, PACIFIC_EPSG};

    // ========================================================================
    // Thresholds
    // ========================================================================

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify_ndvi(-0.5), 0);
        assert_eq!(classify_ndvi(0.0), 0);
        assert_eq!(classify_ndvi(0.4), 0);
        assert_eq!(classify_ndvi(0.41), 1);
        assert_eq!(classify_ndvi(0.7), 1);
        assert_eq!(classify_ndvi(0.71), 2);
        assert_eq!(classify_ndvi(1.0), 2);
        assert_eq!(classify_ndvi(f64::NAN), OUTPUT_NODATA);
    }

    #[test]
    fn test_ndvi() {
        assert_relative_eq!(ndvi(0.1, 0.3), 0.5);
        assert_relative_eq!(ndvi(0.2, 0.2), 0.0);
        assert!(ndvi(0.0, 0.0).is_nan());
        assert!(ndvi(f64::NAN, 0.3).is_nan());
    }

    #[test]
    fn test_threshold_edges_use_double_precision() {
        // Raw pairs whose NDVI lands within an f32 ulp of a threshold
        let red = Band::new(geobox(), vec![27.0, 75.0, 51.0, 15.0]).expect("valid band");
        let nir = Band::new(geobox(), vec![63.0, 175.0, 289.0, 85.0]).expect("valid band");

        let processor = MangrovesProcessor::new(MultiPolygon::new(vec![everywhere()]), 10000.0, 0.0);
        let out = processor.process(&red, &nir).expect("Should process");

        // NDVI: 0.4 - 1ulp, 0.4 + 1ulp, exactly 0.7, 0.7 + 1ulp
        assert_eq!(out.data, vec![0, 1, 1, 2]);
    }

    // ========================================================================
    // Processor
    // ========================================================================

    fn geobox() -> GeoBox {
        GeoBox::new(4, 1, GeoTransform::new(0.0, 10.0, 10.0, -10.0), PACIFIC_EPSG)
    }

    fn everywhere() -> Polygon<f64> {
        polygon![
            (x: -1.0, y: -1.0),
            (x: 100.0, y: -1.0),
            (x: 100.0, y: 100.0),
            (x: -1.0, y: 100.0),
            (x: -1.0, y: -1.0),
        ]
    }

    #[test]
    fn test_process_classifies_scaled_bands() {
        let red = Band::new(geobox(), vec![1000.0, 1000.0, 500.0, f32::NAN]).expect("valid band");
        let nir = Band::new(geobox(), vec![1000.0, 3000.0, 5000.0, 4000.0]).expect("valid band");

        let processor = MangrovesProcessor::new(MultiPolygon::new(vec![everywhere()]), 10000.0, 0.0);
        let out = processor.process(&red, &nir).expect("Should process");

        // NDVI: 0.0, 0.5, ~0.818, NaN
        assert_eq!(out.data, vec![0, 1, 2, OUTPUT_NODATA]);
        assert_eq!(out.name, OUTPUT_BAND);
        assert_eq!(out.nodata, OUTPUT_NODATA);
    }

    #[test]
    fn test_process_clips_reflectance() {
        // Raw values above scale clip to 1.0, negatives to 0.0
        let red = Band::new(geobox(), vec![-500.0, 0.0, 0.0, 0.0]).expect("valid band");
        let nir = Band::new(geobox(), vec![20000.0, 0.0, 0.0, 0.0]).expect("valid band");

        let processor = MangrovesProcessor::new(MultiPolygon::new(vec![everywhere()]), 10000.0, 0.0);
        let out = processor.process(&red, &nir).expect("Should process");
        assert_eq!(out.data[0], 2);
        assert_eq!(out.data[1], OUTPUT_NODATA);
    }

    #[test]
    fn test_process_masks_outside_areas() {
        // Covers only the first two pixel centres (x = 5, 15)
        let areas = polygon![
            (x: 0.0, y: 0.0),
            (x: 20.0, y: 0.0),
            (x: 20.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        let red = Band::new(geobox(), vec![1000.0; 4]).expect("valid band");
        let nir = Band::new(geobox(), vec![9000.0; 4]).expect("valid band");

        let processor = MangrovesProcessor::new(MultiPolygon::new(vec![areas]), 10000.0, 0.0);
        let out = processor.process(&red, &nir).expect("Should process");
        assert_eq!(out.data, vec![2, 2, OUTPUT_NODATA, OUTPUT_NODATA]);
    }

    #[test]
    fn test_process_rejects_mismatched_grids() {
        let red = Band::empty(geobox());
        let nir = Band::empty(GeoBox::new(2, 2, geobox().transform, PACIFIC_EPSG));
        let processor = MangrovesProcessor::new(MultiPolygon::new(vec![]), 10000.0, 0.0);
        assert!(processor.process(&red, &nir).is_err());
    }
}
