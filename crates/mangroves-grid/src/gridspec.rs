//! Tiling grid definition, tile indices and per-tile pixel grids.
//!
//! ## Tile Coordinate System
//!
//! The grid is a regular partition of the projected plane:
//! - `x` is the column, increasing eastward from the grid origin
//! - `y` is the row, increasing northward from the grid origin
//!
//! Tile `(ix, iy)` covers
//! `[ox + ix * S, ox + (ix + 1) * S] x [oy + iy * S, oy + (iy + 1) * S]`
//! where `S` is the tile size in metres. The pixel grid of a tile is
//! north-up, so its affine origin is the tile's top-left corner.

use crate::projection::{Mercator, PACIFIC_EPSG, WGS84_EPSG};
use crate::{GridError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of points per tile edge when tracing a footprint in EPSG:4326.
const FOOTPRINT_POINTS_PER_EDGE: usize = 16;

/// Tile coordinates within a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    /// Column (increases eastward).
    pub x: i32,
    /// Row (increases northward).
    pub y: i32,
}

impl TileIndex {
    /// Create a new tile index.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Build a tile index from the legacy region code and region index pair.
    pub fn from_region(code: &str, index: &str) -> Result<Self> {
        format!("{},{}", code.trim(), index.trim()).parse()
    }

    /// Zero-padded components, as used in output paths (`063`, `020`).
    pub fn padded(&self) -> [String; 2] {
        [format!("{:03}", self.x), format!("{:03}", self.y)]
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for TileIndex {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut parts = trimmed.split(',').map(str::trim);

        let x = parts.next().and_then(|p| p.parse().ok());
        let y = parts.next().and_then(|p| p.parse().ok());

        match (x, y, parts.next()) {
            (Some(x), Some(y), None) => Ok(Self { x, y }),
            _ => Err(GridError::InvalidTileId(s.to_string())),
        }
    }
}

/// Axis-aligned bounding box in some CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box containing all points. `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc, (x, y)| {
            Some(match acc {
                None => Self::new(x, y, x, y),
                Some(b) => Self::new(b.min_x.min(x), b.min_y.min(y), b.max_x.max(x), b.max_y.max(y)),
            })
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Corners in ring order, starting bottom-left, counter-clockwise.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ]
    }
}

/// Affine transform of a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the top-left corner.
    pub origin_x: f64,
    /// Y coordinate of the top-left corner.
    pub origin_y: f64,
    /// Pixel width (positive).
    pub pixel_width: f64,
    /// Pixel height (negative for north-up rasters).
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Six-element affine in STAC `proj:transform` order `[a, b, c, d, e, f]`.
    pub fn to_affine(&self) -> [f64; 6] {
        [
            self.pixel_width,
            0.0,
            self.origin_x,
            0.0,
            self.pixel_height,
            self.origin_y,
        ]
    }
}

/// Pixel grid of a raster: shape, transform and CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Affine transform.
    pub transform: GeoTransform,
    /// EPSG code of the CRS.
    pub epsg: u32,
}

impl GeoBox {
    pub fn new(width: u32, height: u32, transform: GeoTransform, epsg: u32) -> Self {
        Self {
            width,
            height,
            transform,
            epsg,
        }
    }

    /// `(height, width)`, matching the STAC `proj:shape` order.
    pub fn shape(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel size in CRS units (absolute).
    pub fn resolution(&self) -> f64 {
        self.transform.pixel_width.abs()
    }

    /// Extent in CRS units.
    pub fn extent(&self) -> BoundingBox {
        let t = &self.transform;
        let x1 = t.origin_x + self.width as f64 * t.pixel_width;
        let y1 = t.origin_y + self.height as f64 * t.pixel_height;
        BoundingBox::new(
            t.origin_x.min(x1),
            t.origin_y.min(y1),
            t.origin_x.max(x1),
            t.origin_y.max(y1),
        )
    }

    /// CRS coordinates of a pixel centre.
    pub fn pixel_center(&self, col: u32, row: u32) -> (f64, f64) {
        let t = &self.transform;
        (
            t.origin_x + (col as f64 + 0.5) * t.pixel_width,
            t.origin_y + (row as f64 + 0.5) * t.pixel_height,
        )
    }

    /// Pixel containing a CRS coordinate, or `None` if outside the grid.
    pub fn pixel_of(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        let t = &self.transform;
        let col = ((x - t.origin_x) / t.pixel_width).floor();
        let row = ((y - t.origin_y) / t.pixel_height).floor();

        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((col as u32, row as u32))
    }

    /// Coarsen the grid by an integer factor, keeping the top-left corner.
    pub fn zoom_out(&self, factor: u32) -> Result<GeoBox> {
        if factor == 0 {
            return Err(GridError::InvalidZoomFactor(factor));
        }
        let f = factor as f64;
        Ok(GeoBox {
            width: self.width.div_ceil(factor),
            height: self.height.div_ceil(factor),
            transform: GeoTransform {
                pixel_width: self.transform.pixel_width * f,
                pixel_height: self.transform.pixel_height * f,
                ..self.transform
            },
            epsg: self.epsg,
        })
    }

    /// Outline of the geobox in EPSG:4326 as a closed ring of `(lon, lat)`.
    ///
    /// Edges are densified so the ring follows the projected boundary. When
    /// the outline crosses the antimeridian the longitudes stay continuous
    /// (some exceed 180°) instead of jumping.
    pub fn footprint_lonlat(&self) -> Result<Vec<(f64, f64)>> {
        let corners = self.extent().corners();
        let mut ring = Vec::with_capacity(4 * FOOTPRINT_POINTS_PER_EDGE + 1);

        for i in 0..4 {
            let (x0, y0) = corners[i];
            let (x1, y1) = corners[(i + 1) % 4];
            for step in 0..FOOTPRINT_POINTS_PER_EDGE {
                let t = step as f64 / FOOTPRINT_POINTS_PER_EDGE as f64;
                ring.push(to_lonlat_unwrapped(self.epsg, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t)?);
            }
        }

        // Shift back into [-180, 180] when the whole ring lies past the antimeridian
        let min_lon = ring.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_lon = ring.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let shift = if min_lon > 180.0 {
            -360.0
        } else if max_lon < -180.0 {
            360.0
        } else {
            0.0
        };
        for p in ring.iter_mut() {
            p.0 += shift;
        }

        if let Some(&first) = ring.first() {
            ring.push(first);
        }
        Ok(ring)
    }

    /// Bounding box in EPSG:4326 as `[west, south, east, north]`.
    ///
    /// Crossing the antimeridian yields `west > east`, as STAC allows.
    pub fn bbox_lonlat(&self) -> Result<[f64; 4]> {
        let ring = self.footprint_lonlat()?;
        let bbox = BoundingBox::from_points(ring).ok_or(GridError::UnsupportedCrs(self.epsg))?;

        let west = crate::projection::wrap_longitude(bbox.min_x);
        let east = if bbox.max_x == 180.0 {
            180.0
        } else {
            crate::projection::wrap_longitude(bbox.max_x)
        };
        Ok([west, bbox.min_y, east, bbox.max_y])
    }
}

/// Transform a CRS coordinate to `(lon, lat)` without wrapping.
fn to_lonlat_unwrapped(epsg: u32, x: f64, y: f64) -> Result<(f64, f64)> {
    match epsg {
        PACIFIC_EPSG => Ok(Mercator::pacific().inverse_unwrapped(x, y)),
        WGS84_EPSG => Ok((x, y)),
        other => Err(GridError::UnsupportedCrs(other)),
    }
}

/// Definition of a regular tiling grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// EPSG code of the grid CRS.
    pub epsg: u32,
    /// Grid origin `(x, y)` in CRS units.
    pub origin: (f64, f64),
    /// Pixel size in CRS units.
    pub resolution: f64,
    /// Tile shape in pixels `(width, height)`.
    pub tile_shape: (u32, u32),
}

/// The Pacific grid at 10 m resolution: 9600x9600 pixel (96 km) tiles in EPSG:3832.
pub const PACIFIC_GRID_10: GridSpec = GridSpec {
    epsg: PACIFIC_EPSG,
    origin: (-3_000_000.0, -4_000_000.0),
    resolution: 10.0,
    tile_shape: (9600, 9600),
};

impl GridSpec {
    /// Tile size in CRS units `(width, height)`.
    pub fn tile_size(&self) -> (f64, f64) {
        (
            self.tile_shape.0 as f64 * self.resolution,
            self.tile_shape.1 as f64 * self.resolution,
        )
    }

    /// Tile containing a CRS coordinate.
    pub fn tile_of(&self, x: f64, y: f64) -> TileIndex {
        let (sx, sy) = self.tile_size();
        TileIndex::new(
            ((x - self.origin.0) / sx).floor() as i32,
            ((y - self.origin.1) / sy).floor() as i32,
        )
    }

    /// Extent of a tile in CRS units.
    pub fn tile_extent(&self, index: TileIndex) -> BoundingBox {
        let (sx, sy) = self.tile_size();
        let min_x = self.origin.0 + index.x as f64 * sx;
        let min_y = self.origin.1 + index.y as f64 * sy;
        BoundingBox::new(min_x, min_y, min_x + sx, min_y + sy)
    }

    /// North-up pixel grid of a tile.
    pub fn tile_geobox(&self, index: TileIndex) -> GeoBox {
        let extent = self.tile_extent(index);
        GeoBox::new(
            self.tile_shape.0,
            self.tile_shape.1,
            GeoTransform::new(extent.min_x, extent.max_y, self.resolution, -self.resolution),
            self.epsg,
        )
    }

    /// All tiles whose extent intersects `bbox` (CRS units), ordered by row then column.
    pub fn tiles(&self, bbox: &BoundingBox) -> Vec<TileIndex> {
        let (sx, sy) = self.tile_size();

        let x_first = ((bbox.min_x - self.origin.0) / sx).floor() as i32;
        let y_first = ((bbox.min_y - self.origin.1) / sy).floor() as i32;
        let x_last = (((bbox.max_x - self.origin.0) / sx).ceil() as i32 - 1).max(x_first);
        let y_last = (((bbox.max_y - self.origin.1) / sy).ceil() as i32 - 1).max(y_first);

        (y_first..=y_last)
            .flat_map(|y| (x_first..=x_last).map(move |x| TileIndex::new(x, y)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_tile_id_parse_and_display() {
        let tile: TileIndex = "63,20".parse().expect("Should parse tile id");
        assert_eq!(tile, TileIndex::new(63, 20));
        assert_eq!(tile.to_string(), "63,20");

        let tile: TileIndex = "(-1, 7)".parse().expect("Should parse tuple form");
        assert_eq!(tile, TileIndex::new(-1, 7));
    }

    #[test]
    fn test_tile_id_invalid() {
        assert!("63".parse::<TileIndex>().is_err());
        assert!("63,20,1".parse::<TileIndex>().is_err());
        assert!("a,b".parse::<TileIndex>().is_err());
        assert!("".parse::<TileIndex>().is_err());
    }

    #[test]
    fn test_tile_from_region() {
        let tile = TileIndex::from_region("66", " 22").expect("Should build from region pair");
        assert_eq!(tile, TileIndex::new(66, 22));
    }

    #[test]
    fn test_tile_padded() {
        assert_eq!(TileIndex::new(63, 7).padded(), ["063".to_string(), "007".to_string()]);
    }

    #[test]
    fn test_tile_extent_and_geobox() {
        let grid = PACIFIC_GRID_10;
        let extent = grid.tile_extent(TileIndex::new(63, 20));
        assert_eq!(extent.min_x, -3_000_000.0 + 63.0 * 96_000.0);
        assert_eq!(extent.min_y, -4_000_000.0 + 20.0 * 96_000.0);
        assert_eq!(extent.width(), 96_000.0);

        let geobox = grid.tile_geobox(TileIndex::new(63, 20));
        assert_eq!(geobox.shape(), (9600, 9600));
        assert_eq!(geobox.transform.origin_y, extent.max_y);
        assert_eq!(geobox.extent(), extent);
    }

    #[test]
    fn test_tile_of_matches_extent() {
        let grid = PACIFIC_GRID_10;
        // Suva, Fiji in grid coordinates
        let (x, y) = Mercator::pacific().forward(178.4419, -18.1416);
        let tile = grid.tile_of(x, y);
        let extent = grid.tile_extent(tile);
        assert!(x >= extent.min_x && x < extent.max_x);
        assert!(y >= extent.min_y && y < extent.max_y);
    }

    #[test]
    fn test_tiles_over_bbox() {
        let grid = PACIFIC_GRID_10;
        let a = grid.tile_extent(TileIndex::new(10, 5));
        let b = grid.tile_extent(TileIndex::new(12, 6));
        // Slightly inside the outer edges so no neighbour is touched
        let bbox = BoundingBox::new(a.min_x + 1.0, a.min_y + 1.0, b.max_x - 1.0, b.max_y - 1.0);

        let tiles = grid.tiles(&bbox);
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles.first(), Some(&TileIndex::new(10, 5)));
        assert_eq!(tiles.last(), Some(&TileIndex::new(12, 6)));
    }

    #[test]
    fn test_tiles_exact_edges_do_not_spill() {
        let grid = PACIFIC_GRID_10;
        let extent = grid.tile_extent(TileIndex::new(3, 4));
        assert_eq!(grid.tiles(&extent), vec![TileIndex::new(3, 4)]);
    }

    #[test]
    fn test_pixel_center_and_pixel_of() {
        let geobox = PACIFIC_GRID_10.tile_geobox(TileIndex::new(0, 0));
        let (x, y) = geobox.pixel_center(0, 0);
        assert_eq!(x, -3_000_000.0 + 5.0);
        assert_eq!(y, -4_000_000.0 + 96_000.0 - 5.0);
        assert_eq!(geobox.pixel_of(x, y), Some((0, 0)));

        let (x, y) = geobox.pixel_center(9599, 9599);
        assert_eq!(geobox.pixel_of(x, y), Some((9599, 9599)));
        assert_eq!(geobox.pixel_of(x + 10.0, y), None);
    }

    #[test]
    fn test_zoom_out() {
        let geobox = PACIFIC_GRID_10.tile_geobox(TileIndex::new(63, 20));
        let coarse = geobox.zoom_out(10).expect("Should zoom out");
        assert_eq!(coarse.shape(), (960, 960));
        assert_eq!(coarse.resolution(), 100.0);
        assert_eq!(coarse.extent(), geobox.extent());

        let odd = GeoBox::new(15, 7, geobox.transform, geobox.epsg)
            .zoom_out(4)
            .expect("Should zoom out");
        assert_eq!(odd.shape(), (2, 4));

        assert!(geobox.zoom_out(0).is_err());
    }

    #[test]
    fn test_footprint_is_closed_ring() {
        let geobox = PACIFIC_GRID_10.tile_geobox(TileIndex::new(63, 20));
        let ring = geobox.footprint_lonlat().expect("Should build footprint");
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring.len(), 4 * FOOTPRINT_POINTS_PER_EDGE + 1);
    }

    #[test]
    fn test_bbox_lonlat_contains_projected_point() {
        let grid = PACIFIC_GRID_10;
        let (x, y) = Mercator::pacific().forward(178.4419, -18.1416);
        let geobox = grid.tile_geobox(grid.tile_of(x, y));
        let [west, south, east, north] = geobox.bbox_lonlat().expect("Should compute bbox");

        assert!(west <= 178.4419 && 178.4419 <= east);
        assert!(south <= -18.1416 && -18.1416 <= north);
        assert_abs_diff_eq!(east - west, 96_000.0 / 6_378_137.0 * 180.0 / std::f64::consts::PI, epsilon = 1e-9);
    }

    #[test]
    fn test_bbox_lonlat_across_antimeridian() {
        let grid = PACIFIC_GRID_10;
        // A tile straddling 180°: x of the antimeridian is 30° east of 150°E
        let (x, y) = Mercator::pacific().forward(180.0, -17.0);
        let geobox = grid.tile_geobox(grid.tile_of(x - 1.0, y));
        let extent = geobox.extent();
        assert!(
            extent.min_x < x && x < extent.max_x,
            "tile should straddle the antimeridian: {extent:?}"
        );
        let [west, _, east, _] = geobox.bbox_lonlat().expect("Should compute bbox");
        assert!(west > east, "antimeridian bbox should wrap: {west} {east}");
        assert!(west > 179.0 && east < -179.0);
    }

    #[test]
    fn test_unsupported_crs_footprint() {
        let geobox = GeoBox::new(10, 10, GeoTransform::new(0.0, 0.0, 1.0, -1.0), 32760);
        assert!(geobox.footprint_lonlat().is_err());
    }
}
