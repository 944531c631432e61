//! `run-task`: classify one tile for one datetime.

use crate::cluster::{estimate_tile_bytes, ClusterSettings};
use crate::run_log::{append_run_log, RunLogEntry, RunStatus};
use crate::tasks::OUTPUT_DATASET;
use crate::{Result, RunnerError};
use chrono::Utc;
use geo::{coord, Polygon, Rect};
use mangroves_grid::{BoundingBox, GeoBox, TileIndex, PACIFIC_GRID_10};
use mangroves_raster::{read_band, reproject_and_mosaic, Band, ClassifiedBand, MangrovesProcessor};
use mangroves_stac::{
    s3_to_https, DatetimeRange, Item, ItemPath, SearchParams, StacClient, StacCreator, StacError,
    WrittenAsset,
};
use mangroves_store::ObjectStore;
use mangroves_vector::{PolygonIndex, SourceFetcher};
use rayon::prelude::*;
use tracing::{error, info, info_span, warn};

/// Bands loaded from each input item.
pub const INPUT_BANDS: [&str; 2] = ["red", "nir"];

/// Resolution divisor for `--decimated` runs.
pub const DECIMATION_FACTOR: u32 = 10;

const GEOTIFF_CONTENT_TYPE: &str = "image/tiff; application=geotiff";

/// Inputs of one `run-task` invocation.
#[derive(Debug, Clone)]
pub struct RunTaskArgs {
    pub tile: TileIndex,
    pub datetime: String,
    pub version: String,
    pub output_prefix: Option<String>,
    pub base_product: String,
    pub region: String,
    pub scale: f32,
    pub offset: f32,
    pub decimated: bool,
    pub overwrite: bool,
    pub cluster: ClusterSettings,
}

impl RunTaskArgs {
    pub fn item_path(&self) -> ItemPath {
        ItemPath::new(&self.base_product, OUTPUT_DATASET, &self.version, &self.datetime)
            .with_output_prefix(self.output_prefix.as_deref())
    }

    /// Tile geobox, coarsened when decimated.
    pub fn geobox(&self) -> Result<GeoBox> {
        let geobox = PACIFIC_GRID_10.tile_geobox(self.tile);
        if self.decimated {
            warn!("Running at 1/{DECIMATION_FACTOR}th resolution");
            return Ok(geobox.zoom_out(DECIMATION_FACTOR)?);
        }
        Ok(geobox)
    }
}

/// How a task finished successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Outputs written; `paths` are the written keys, STAC document last.
    Completed { paths: Vec<String>, stac_url: String },
    /// The STAC document was already there and overwrite was off.
    AlreadyExists { stac_key: String },
    /// The search found nothing for this tile.
    NoItems,
}

impl TaskOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            TaskOutcome::Completed { .. } => RunStatus::Completed,
            TaskOutcome::AlreadyExists { .. } => RunStatus::AlreadyExists,
            TaskOutcome::NoItems => RunStatus::NoItems,
        }
    }
}

/// Process exit code for a task result: success outcomes are 0, errors 1.
pub fn exit_code(result: &Result<TaskOutcome>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Searches for input items and loads their bands.
pub trait ItemSource: Sync {
    /// Items over `bbox` (EPSG:4326) in `datetime`. An empty result is
    /// [`StacError::EmptyCollection`].
    fn find_items(&self, bbox: [f64; 4], datetime: &DatetimeRange) -> Result<Vec<Item>>;

    /// Load one band of an item.
    fn load_band(&self, item: &Item, band: &str) -> Result<Band>;
}

/// Items from a STAC API, assets downloaded through a cache.
pub struct StacItemSource {
    client: StacClient,
    collection: String,
    fetcher: SourceFetcher,
    region: String,
}

impl StacItemSource {
    pub fn new(client: StacClient, collection: &str, fetcher: SourceFetcher, region: &str) -> Self {
        Self {
            client,
            collection: collection.to_string(),
            fetcher,
            region: region.to_string(),
        }
    }
}

impl ItemSource for StacItemSource {
    fn find_items(&self, bbox: [f64; 4], datetime: &DatetimeRange) -> Result<Vec<Item>> {
        let params = SearchParams::new()
            .bbox(bbox)
            .datetime(&datetime.to_interval())
            .collections(&[self.collection.as_str()]);
        Ok(self.client.find_items(&params)?)
    }

    fn load_band(&self, item: &Item, band: &str) -> Result<Band> {
        let asset = item.asset(band).ok_or_else(|| RunnerError::MissingAsset {
            item: item.id.clone(),
            asset: band.to_string(),
        })?;
        let href = s3_to_https(&asset.href, &self.region);
        let path = self.fetcher.fetch(&href)?;
        Ok(read_band(path)?)
    }
}

/// Load `band` from every item onto `geobox`, first valid item wins.
///
/// Items that fail to load are skipped with a warning; all failing is an error.
pub fn load_mosaic(source: &dyn ItemSource, items: &[Item], band: &str, geobox: &GeoBox) -> Result<Band> {
    let loaded: Vec<Result<Band>> = items.par_iter().map(|item| source.load_band(item, band)).collect();

    let mut bands = Vec::with_capacity(loaded.len());
    let mut last_error = None;
    for (item, result) in items.iter().zip(loaded) {
        match result {
            Ok(b) => bands.push(b),
            Err(e) => {
                warn!(item = %item.id, band, error = %e, "Skipping item that failed to load");
                last_error = Some(e);
            }
        }
    }

    if bands.is_empty() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }
    Ok(reproject_and_mosaic(&bands, geobox)?)
}

/// Run one task end to end.
pub fn run_task(
    args: &RunTaskArgs,
    gmw: &PolygonIndex,
    store: &dyn ObjectStore,
    source: &dyn ItemSource,
) -> Result<TaskOutcome> {
    let span = info_span!("task", tile = %args.tile);
    let _guard = span.enter();
    info!("Starting processing");

    let geobox = args.geobox()?;
    let areas = gmw.intersection(&extent_polygon(&geobox.extent()));
    info!(polygons = areas.0.len(), "Clipped mangrove areas to tile");

    let item_path = args.item_path();
    let stac_key = item_path.stac_path(args.tile);
    if !args.overwrite && store.exists(&stac_key)? {
        info!("Item already exists at {stac_key}");
        return Ok(TaskOutcome::AlreadyExists { stac_key });
    }

    let datetime: DatetimeRange = args.datetime.parse()?;
    let items = match source.find_items(geobox.bbox_lonlat()?, &datetime) {
        Err(RunnerError::Stac(StacError::EmptyCollection { .. })) => {
            info!("No items found for this tile");
            return Ok(TaskOutcome::NoItems);
        }
        result => result?,
    };
    info!(items = items.len(), "Found input items");

    args.cluster
        .check_memory(estimate_tile_bytes(geobox.len(), items.len()))?;
    let pool = args.cluster.build_pool()?;

    let processor = MangrovesProcessor::new(areas, args.scale, args.offset);
    let classified: ClassifiedBand = pool.install(|| -> Result<ClassifiedBand> {
        let [red_band, nir_band] = INPUT_BANDS;
        let red = load_mosaic(source, &items, red_band, &geobox)?;
        let nir = load_mosaic(source, &items, nir_band, &geobox)?;
        Ok(processor.process(&red, &nir)?)
    })?;

    let paths = write_outputs(args, &item_path, &geobox, &datetime, &classified, store)?;
    let stac_url = store.url(&stac_key);
    info!(
        "Completed processing. Wrote {} items to {}",
        paths.len(),
        stac_url
    );
    Ok(TaskOutcome::Completed { paths, stac_url })
}

/// Write the classified raster, then its STAC item. Returns the written keys.
fn write_outputs(
    args: &RunTaskArgs,
    item_path: &ItemPath,
    geobox: &GeoBox,
    datetime: &DatetimeRange,
    classified: &ClassifiedBand,
    store: &dyn ObjectStore,
) -> Result<Vec<String>> {
    let tif_key = item_path.path(args.tile, &classified.name, ".tif");
    store.put(&tif_key, &classified.to_geotiff()?, GEOTIFF_CONTENT_TYPE)?;

    let creator = StacCreator::new(item_path.clone())
        .with_href_root(&store.href_root())
        .with_region(&args.region)
        .make_hrefs_https(true)
        .with_raster(true);
    let item = creator.create(
        args.tile,
        geobox,
        datetime,
        &[WrittenAsset {
            name: classified.name.clone(),
            key: tif_key.clone(),
            data_type: "int16".to_string(),
            nodata: f64::from(classified.nodata),
        }],
    )?;

    let stac_key = item_path.stac_path(args.tile);
    store.put(&stac_key, &serde_json::to_vec_pretty(&item)?, "application/json")?;
    Ok(vec![tif_key, stac_key])
}

/// Log the result, append it to the run log when asked, and pick the exit code.
pub fn finish(
    args: &RunTaskArgs,
    result: &Result<TaskOutcome>,
    store: Option<&dyn ObjectStore>,
    run_log: bool,
) -> i32 {
    if let Err(e) = result {
        error!(tile = %args.tile, "Failed to process with error: {e}");
    }

    if let (true, Some(store)) = (run_log, store) {
        let (status, message, paths) = match result {
            Ok(outcome @ TaskOutcome::Completed { paths, stac_url }) => {
                (outcome.status(), stac_url.clone(), paths.join(" "))
            }
            Ok(outcome @ TaskOutcome::AlreadyExists { stac_key }) => {
                (outcome.status(), stac_key.clone(), String::new())
            }
            Ok(outcome @ TaskOutcome::NoItems) => {
                (outcome.status(), "No items found for this tile".to_string(), String::new())
            }
            Err(e) => (RunStatus::Failed, e.to_string(), String::new()),
        };
        let entry = RunLogEntry {
            time: Utc::now(),
            tile_id: args.tile.to_string(),
            datetime: args.datetime.clone(),
            version: args.version.clone(),
            status,
            message,
            paths,
        };
        if let Err(e) = append_run_log(store, &args.item_path().log_path(), &entry) {
            warn!("Failed to append run log: {e}");
        }
    }

    exit_code(result)
}

fn extent_polygon(bbox: &BoundingBox) -> Polygon<f64> {
    Rect::new(
        coord! { x: bbox.min_x, y: bbox.min_y },
        coord! { x: bbox.max_x, y: bbox.max_y },
    )
    .to_polygon()
}
