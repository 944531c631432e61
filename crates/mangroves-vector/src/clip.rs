//! Clip reference polygons to the area covered by grid cells.

use crate::{PolygonIndex, PolygonLayer, Result};
use geo::{BooleanOps, MultiPolygon};
use tracing::{debug, info};

/// Clip `layer` to the union of `cells`.
///
/// Both layers are brought into the CRS of `cells` first. Polygons entirely
/// inside the cell union are kept unchanged; polygons crossing its edge are
/// cut; polygons outside it are dropped. Properties follow their polygon.
pub fn clip_to_cells(layer: &PolygonLayer, cells: &PolygonLayer) -> Result<PolygonLayer> {
    let epsg = cells.epsg();
    let layer = layer.to_crs(epsg)?;

    let mask = dissolve(cells);
    let cell_index = PolygonIndex::new(cells.clone());
    info!(
        polygons = layer.len(),
        cells = cells.len(),
        "Clipping reference polygons to grid cells"
    );

    let mut clipped = PolygonLayer::new(Vec::new(), epsg);
    let mut dropped = 0usize;

    for (i, polygon) in layer.polygons().iter().enumerate() {
        if !cell_index.intersects(polygon) {
            dropped += 1;
            continue;
        }

        let props = layer.properties(i).cloned().unwrap_or_default();
        let single = MultiPolygon::new(vec![polygon.clone()]);
        for part in single.intersection(&mask).0 {
            clipped.push(part, props.clone());
        }
    }

    debug!(kept = clipped.len(), dropped, "Clip complete");
    Ok(clipped)
}

/// Union of all polygons in a layer.
fn dissolve(layer: &PolygonLayer) -> MultiPolygon<f64> {
    layer
        .polygons()
        .iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, p| {
            acc.union(&MultiPolygon::new(vec![p.clone()]))
        })
}
