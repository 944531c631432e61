//! Task listing for `print-tasks`.

use crate::{Result, RunnerError};
use mangroves_grid::{GridSpec, TileIndex, PACIFIC_EPSG, PACIFIC_GRID_10};
use mangroves_stac::ItemPath;
use mangroves_store::ObjectStore;
use mangroves_vector::{PolygonIndex, PolygonLayer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Dataset whose STAC documents mark a task as done.
pub const OUTPUT_DATASET: &str = "mangroves";

/// Sensor of the output dataset.
pub const OUTPUT_SENSOR: &str = "s2";

/// One unit of work: a tile in a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "tile-id")]
    pub tile_id: String,
    pub year: i32,
    pub version: String,
}

impl Task {
    pub fn tile(&self) -> Result<TileIndex> {
        Ok(self.tile_id.parse()?)
    }
}

/// Parse `--years`: `YYYY` or an inclusive `YYYY-YYYY` range.
pub fn parse_years(years: &str) -> Result<Vec<i32>> {
    let invalid = || RunnerError::InvalidYears(years.to_string());
    let parts: Vec<i32> = years
        .split('-')
        .map(|p| p.trim().parse().map_err(|_| invalid()))
        .collect::<Result<_>>()?;

    match parts.as_slice() {
        [year] => Ok(vec![*year]),
        [start, end] if start <= end => Ok((*start..=*end).collect()),
        _ => Err(invalid()),
    }
}

/// Parse `--regions`: `ALL` (any case) or comma-separated `GID_0` codes.
pub fn parse_regions(regions: &str) -> Option<Vec<String>> {
    if regions.trim().eq_ignore_ascii_case("ALL") {
        return None;
    }
    Some(
        regions
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    )
}

/// Tiles of `grid` that intersect both the mangrove areas and the countries.
///
/// `gmw` must be indexed in the grid CRS; `countries` may be in EPSG:4326
/// or the grid CRS and should already be filtered to the wanted codes.
pub fn find_tiles(grid: &GridSpec, gmw: &PolygonIndex, countries: &PolygonLayer) -> Result<Vec<TileIndex>> {
    let countries = PolygonIndex::new(countries.to_crs(PACIFIC_EPSG)?);
    let Some(bbox) = countries.layer().bounding_box() else {
        info!("No country boundaries selected");
        return Ok(Vec::new());
    };

    let candidates = grid.tiles(&bbox);
    debug!(candidates = candidates.len(), "Enumerated tiles over country extent");

    let tiles: Vec<TileIndex> = candidates
        .into_iter()
        .filter(|&tile| {
            let extent = grid.tile_extent(tile);
            gmw.intersects_bbox(&extent) && countries.intersects_bbox(&extent)
        })
        .collect();

    info!(tiles = tiles.len(), "Found tiles with mangroves");
    Ok(tiles)
}

/// Every `(tile, year)` combination, tiles outermost.
pub fn expand_tasks(tiles: &[TileIndex], years: &[i32], version: &str) -> Vec<Task> {
    tiles
        .iter()
        .flat_map(|tile| {
            years.iter().map(move |&year| Task {
                tile_id: tile.to_string(),
                year,
                version: version.to_string(),
            })
        })
        .collect()
}

/// Item path of a task's output.
pub fn task_item_path(task: &Task, output_prefix: Option<&str>) -> ItemPath {
    ItemPath::new(OUTPUT_SENSOR, OUTPUT_DATASET, &task.version, &task.year.to_string())
        .with_output_prefix(output_prefix)
}

/// Drop tasks whose STAC document already exists, stopping at `limit`.
pub fn filter_existing(
    tasks: Vec<Task>,
    store: &dyn ObjectStore,
    output_prefix: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<Task>> {
    let mut pending = Vec::new();
    let mut skipped = 0usize;

    for task in tasks {
        if limit.is_some_and(|limit| pending.len() >= limit) {
            break;
        }
        let key = task_item_path(&task, output_prefix).stac_path(task.tile()?);
        if store.exists(&key)? {
            skipped += 1;
            continue;
        }
        pending.push(task);
    }

    debug!(pending = pending.len(), skipped, "Filtered existing tasks");
    Ok(pending)
}

/// Apply the existence filter (unless overwriting) and the limit.
pub fn select_tasks(
    tasks: Vec<Task>,
    store: Option<&dyn ObjectStore>,
    output_prefix: Option<&str>,
    limit: Option<usize>,
    overwrite: bool,
) -> Result<Vec<Task>> {
    let mut tasks = match (overwrite, store) {
        (false, Some(store)) => filter_existing(tasks, store, output_prefix, limit)?,
        (false, None) => return Err(RunnerError::NoOutputStore),
        (true, _) => tasks,
    };
    if let Some(limit) = limit {
        tasks.truncate(limit);
    }
    Ok(tasks)
}

/// Parameters of a `print-tasks` listing.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub years: Vec<i32>,
    pub version: String,
    /// `GID_0` codes, or `None` for every country.
    pub regions: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub output_prefix: Option<String>,
    pub overwrite: bool,
}

/// Tasks to run: tiles with mangroves in the selected countries, every
/// year, minus finished ones.
pub fn plan_tasks(
    query: &TaskQuery,
    gmw: &PolygonIndex,
    countries: &PolygonLayer,
    store: Option<&dyn ObjectStore>,
) -> Result<Vec<Task>> {
    let countries = countries.filter_countries(query.regions.as_deref());
    let tiles = find_tiles(&PACIFIC_GRID_10, gmw, &countries)?;
    let tasks = expand_tasks(&tiles, &query.years, &query.version);
    select_tasks(
        tasks,
        store,
        query.output_prefix.as_deref(),
        query.limit,
        query.overwrite,
    )
}
