//! # mangroves-stac
//!
//! STAC plumbing for mangrove processing:
//! - [`ItemPath`] names every output object of a dataset version
//! - [`DatetimeRange`] turns `2020` or `2019/2020` into RFC 3339 intervals
//! - [`StacClient`] searches a STAC API, following pagination links
//! - [`StacCreator`] builds the STAC item describing written rasters

mod client;
mod creator;
mod datetime;
mod error;
mod models;
mod path;

pub use client::{StacClient, DEFAULT_CATALOG, GEOMAD_COLLECTION};
pub use creator::{
    StacCreator, WrittenAsset, PROJECTION_EXTENSION, RASTER_EXTENSION, STAC_VERSION,
};
pub use datetime::{rfc3339, DatetimeRange};
pub use error::StacError;
pub use models::{Asset, Item, ItemCollection, Link, SearchParams};
pub use path::{https_url, s3_to_https, ItemPath, DEFAULT_PREFIX, DEFAULT_REGION};

/// Result type for STAC operations.
pub type Result<T> = std::result::Result<T, StacError>;
