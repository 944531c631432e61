//! Polygon rasterisation.

use geo::{LineString, MultiPolygon, Polygon};
use mangroves_grid::GeoBox;
use rayon::prelude::*;

/// Rasterise polygons onto a geobox.
///
/// A pixel is inside when its centre is inside a polygon under the even-odd
/// rule (holes are excluded). Polygons must be in the geobox's CRS.
pub fn rasterize(geobox: &GeoBox, polygons: &MultiPolygon<f64>) -> Vec<bool> {
    let width = geobox.width as usize;
    let mut mask = vec![false; geobox.len()];
    if width == 0 {
        return mask;
    }

    mask.par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out)| {
            let (_, y) = geobox.pixel_center(0, row as u32);
            let mut crossings = Vec::new();
            for polygon in &polygons.0 {
                crossings.clear();
                polygon_crossings(polygon, y, &mut crossings);
                fill_spans(geobox, &mut crossings, out);
            }
        });

    mask
}

/// Set samples outside the polygons to `NaN`.
pub fn apply_mask(data: &mut [f32], mask: &[bool]) {
    for (v, &inside) in data.iter_mut().zip(mask) {
        if !inside {
            *v = f32::NAN;
        }
    }
}

/// X coordinates where the horizontal line at `y` crosses the polygon rings.
fn polygon_crossings(polygon: &Polygon<f64>, y: f64, out: &mut Vec<f64>) {
    ring_crossings(polygon.exterior(), y, out);
    for interior in polygon.interiors() {
        ring_crossings(interior, y, out);
    }
}

fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for line in ring.lines() {
        let (a, b) = (line.start, line.end);
        // Half-open rule so shared vertices are counted once
        if (a.y <= y) != (b.y <= y) {
            let t = (y - a.y) / (b.y - a.y);
            out.push(a.x + t * (b.x - a.x));
        }
    }
}

/// Mark pixel centres between pairs of sorted crossings. Overlapping
/// polygons union.
fn fill_spans(geobox: &GeoBox, crossings: &mut [f64], row: &mut [bool]) {
    crossings.sort_by(f64::total_cmp);

    let t = &geobox.transform;
    let width = geobox.width as f64;
    for pair in crossings.chunks_exact(2) {
        // Pixel c has its centre at origin + (c + 0.5) * pw
        let c0 = ((pair[0] - t.origin_x) / t.pixel_width - 0.5).ceil().max(0.0);
        let c1 = ((pair[1] - t.origin_x) / t.pixel_width - 0.5).ceil().min(width);
        if c1 <= c0 {
            continue;
        }
        for v in &mut row[c0 as usize..c1 as usize] {
            *v = true;
        }
    }
}
