//! STAC item creation for written outputs.

use crate::datetime::{rfc3339, DatetimeRange};
use crate::models::{Asset, Item, Link};
use crate::path::{s3_to_https, ItemPath, DEFAULT_REGION};
use crate::Result;
use chrono::{DateTime, Utc};
use mangroves_grid::{GeoBox, TileIndex};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const STAC_VERSION: &str = "1.0.0";
pub const PROJECTION_EXTENSION: &str =
    "https://stac-extensions.github.io/projection/v1.1.0/schema.json";
pub const RASTER_EXTENSION: &str = "https://stac-extensions.github.io/raster/v1.1.0/schema.json";

const GEOTIFF_MEDIA_TYPE: &str = "image/tiff; application=geotiff";

/// A raster that was written and should appear as an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenAsset {
    /// Asset key, e.g. `mangroves`.
    pub name: String,
    /// Object key in the output store.
    pub key: String,
    /// Raster data type, e.g. `int16`.
    pub data_type: String,
    pub nodata: f64,
}

/// Builds STAC items for the outputs of an [`ItemPath`].
#[derive(Debug, Clone)]
pub struct StacCreator {
    item_path: ItemPath,
    href_root: Option<String>,
    region: String,
    make_hrefs_https: bool,
    with_raster: bool,
}

impl StacCreator {
    pub fn new(item_path: ItemPath) -> Self {
        Self {
            item_path,
            href_root: None,
            region: DEFAULT_REGION.to_string(),
            make_hrefs_https: true,
            with_raster: true,
        }
    }

    /// Root that keys are joined to, e.g. `s3://bucket` or a local directory.
    pub fn with_href_root(mut self, root: &str) -> Self {
        self.href_root = Some(root.trim_end_matches('/').to_string());
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    /// Rewrite `s3://` hrefs as public https URLs.
    pub fn make_hrefs_https(mut self, yes: bool) -> Self {
        self.make_hrefs_https = yes;
        self
    }

    /// Include `raster:bands` in assets.
    pub fn with_raster(mut self, yes: bool) -> Self {
        self.with_raster = yes;
        self
    }

    pub fn item_path(&self) -> &ItemPath {
        &self.item_path
    }

    /// Href for an object key.
    pub fn href(&self, key: &str) -> String {
        let href = match &self.href_root {
            Some(root) => format!("{root}/{key}"),
            None => key.to_string(),
        };
        if self.make_hrefs_https {
            s3_to_https(&href, &self.region)
        } else {
            href
        }
    }

    /// Item for one tile, stamped with the current time.
    pub fn create(
        &self,
        tile: TileIndex,
        geobox: &GeoBox,
        datetime: &DatetimeRange,
        assets: &[WrittenAsset],
    ) -> Result<Item> {
        self.create_at(tile, geobox, datetime, assets, Utc::now())
    }

    /// Item for one tile with an explicit `created` timestamp.
    pub fn create_at(
        &self,
        tile: TileIndex,
        geobox: &GeoBox,
        datetime: &DatetimeRange,
        assets: &[WrittenAsset],
        created: DateTime<Utc>,
    ) -> Result<Item> {
        let ring: Vec<[f64; 2]> = geobox
            .footprint_lonlat()?
            .into_iter()
            .map(|(lon, lat)| [lon, lat])
            .collect();
        let bbox = geobox.bbox_lonlat()?;

        let mut properties = Map::new();
        if datetime.start == datetime.end {
            properties.insert("datetime".into(), json!(rfc3339(&datetime.start)));
        } else {
            properties.insert("datetime".into(), Value::Null);
            properties.insert("start_datetime".into(), json!(rfc3339(&datetime.start)));
            properties.insert("end_datetime".into(), json!(rfc3339(&datetime.end)));
        }
        properties.insert("created".into(), json!(rfc3339(&created)));
        properties.insert("proj:epsg".into(), json!(geobox.epsg));
        let (height, width) = geobox.shape();
        properties.insert("proj:shape".into(), json!([height, width]));
        let mut transform = geobox.transform.to_affine().to_vec();
        transform.extend([0.0, 0.0, 1.0]);
        properties.insert("proj:transform".into(), json!(transform));

        let assets: BTreeMap<String, Asset> = assets
            .iter()
            .map(|a| (a.name.clone(), self.asset(a)))
            .collect();

        let mut extensions = vec![PROJECTION_EXTENSION.to_string()];
        if self.with_raster {
            extensions.push(RASTER_EXTENSION.to_string());
        }

        let mut self_link = Link::new("self", &self.href(&self.item_path.stac_path(tile)));
        self_link.type_ = Some("application/json".to_string());

        Ok(Item {
            type_: "Feature".to_string(),
            stac_version: Some(STAC_VERSION.to_string()),
            stac_extensions: extensions,
            id: self.item_path.basename(tile),
            geometry: Some(json!({"type": "Polygon", "coordinates": [ring]})),
            bbox: Some(bbox.to_vec()),
            properties,
            assets,
            collection: Some(self.item_path.item_prefix()),
            links: vec![self_link],
        })
    }

    fn asset(&self, written: &WrittenAsset) -> Asset {
        let mut extra = Map::new();
        if self.with_raster {
            extra.insert(
                "raster:bands".into(),
                json!([{"nodata": written.nodata, "data_type": written.data_type}]),
            );
        }
        Asset {
            href: self.href(&written.key),
            type_: Some(GEOTIFF_MEDIA_TYPE.to_string()),
            title: Some(written.name.clone()),
            roles: Some(vec!["data".to_string()]),
            extra,
        }
    }
}
