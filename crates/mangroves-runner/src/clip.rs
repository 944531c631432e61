//! `clip-gmw`: prepare GMW polygons for the grid.

use crate::Result;
use mangroves_grid::PACIFIC_EPSG;
use mangroves_vector::{clip_to_cells, load_layer, SourceFetcher};
use std::path::Path;
use tracing::info;

/// Reproject GMW to the grid CRS, clip it to the grid cells and write GeoJSON.
///
/// Returns the number of polygons written.
pub fn clip_gmw(fetcher: &SourceFetcher, gmw_source: &str, grid_source: &str, output: &Path) -> Result<usize> {
    info!(source = gmw_source, "Loading GMW");
    let gmw = load_layer(fetcher, gmw_source)?;

    info!(source = grid_source, "Loading grid cells");
    let cells = load_layer(fetcher, grid_source)?.to_crs(PACIFIC_EPSG)?;

    let clipped = clip_to_cells(&gmw, &cells)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    clipped.write_geojson(output)?;

    info!(
        polygons = clipped.len(),
        output = %output.display(),
        "Wrote clipped GMW"
    );
    Ok(clipped.len())
}
