//! Nearest-neighbour reprojection and mosaicking.

use crate::{Band, RasterError, Result};
use mangroves_grid::{GeoBox, Mercator, PACIFIC_EPSG, WGS84_EPSG};
use rayon::prelude::*;
use tracing::debug;

/// Coordinate transform from target CRS to source CRS.
#[derive(Debug, Clone, Copy)]
enum Transform {
    Identity,
    PacificToLonLat,
    LonLatToPacific,
}

impl Transform {
    fn between(target: u32, source: u32) -> Result<Self> {
        match (target, source) {
            (t, s) if t == s => Ok(Transform::Identity),
            (PACIFIC_EPSG, WGS84_EPSG) => Ok(Transform::PacificToLonLat),
            (WGS84_EPSG, PACIFIC_EPSG) => Ok(Transform::LonLatToPacific),
            _ => Err(RasterError::UnsupportedReprojection {
                from: source,
                to: target,
            }),
        }
    }

    fn apply(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Transform::Identity => (x, y),
            Transform::PacificToLonLat => Mercator::pacific().inverse(x, y),
            Transform::LonLatToPacific => Mercator::pacific().forward(x, y),
        }
    }
}

/// Reproject `source` onto `target` by nearest-neighbour sampling.
///
/// Target pixels whose centre falls outside the source are `NaN`.
pub fn reproject(source: &Band, target: &GeoBox) -> Result<Band> {
    let transform = Transform::between(target.epsg, source.geobox().epsg)?;
    let src = source.geobox();
    let lonlat_source = matches!(transform, Transform::PacificToLonLat);

    let width = target.width as usize;
    let mut data = vec![f32::NAN; target.len()];
    if width == 0 {
        return Band::new(*target, data);
    }

    data.par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out)| {
            for (col, value) in out.iter_mut().enumerate() {
                let (x, y) = target.pixel_center(col as u32, row as u32);
                let (sx, sy) = transform.apply(x, y);

                let mut hit = src.pixel_of(sx, sy);
                // Geographic sources may use longitudes past 180
                if hit.is_none() && lonlat_source {
                    hit = src
                        .pixel_of(sx + 360.0, sy)
                        .or_else(|| src.pixel_of(sx - 360.0, sy));
                }
                if let Some((c, r)) = hit {
                    *value = source.data()[r as usize * src.width as usize + c as usize];
                }
            }
        });

    Band::new(*target, data)
}

/// Fill each pixel with the first valid value from `bands`, in order.
///
/// All bands must already share the grid of `geobox`.
pub fn mosaic_first(geobox: &GeoBox, bands: &[Band]) -> Result<Band> {
    let mut out = Band::empty(*geobox);
    let template = out.clone();

    for (i, band) in bands.iter().enumerate() {
        template.check_same_grid(&format!("mosaic input {i}"), band)?;
        out.data_mut()
            .par_iter_mut()
            .zip(band.data().par_iter())
            .for_each(|(dst, &src)| {
                if dst.is_nan() && !src.is_nan() {
                    *dst = src;
                }
            });
    }

    debug!(inputs = bands.len(), valid = out.valid_count(), "Mosaic complete");
    Ok(out)
}

/// Reproject every band onto `geobox` and mosaic them, first valid wins.
pub fn reproject_and_mosaic(bands: &[Band], geobox: &GeoBox) -> Result<Band> {
    let reprojected = bands
        .iter()
        .map(|b| reproject(b, geobox))
        .collect::<Result<Vec<_>>>()?;
    mosaic_first(geobox, &reprojected)
}
