//! Polygon layers loaded from GeoJSON, with reprojection and filtering.

use crate::{Result, VectorError};
use geo::{BoundingRect, Coord, Geometry, MapCoords, MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use mangroves_grid::{BoundingBox, Mercator, PACIFIC_EPSG, WGS84_EPSG};
use std::path::Path;
use tracing::warn;

/// Property holding the ISO country code in GADM boundaries.
pub const COUNTRY_CODE_PROPERTY: &str = "GID_0";

/// A set of polygons in one CRS, each with the properties of its source feature.
#[derive(Debug, Clone)]
pub struct PolygonLayer {
    polygons: Vec<Polygon<f64>>,
    properties: Vec<JsonObject>,
    epsg: u32,
}

impl PolygonLayer {
    /// Create a layer from polygons with empty properties.
    pub fn new(polygons: Vec<Polygon<f64>>, epsg: u32) -> Self {
        let properties = vec![JsonObject::new(); polygons.len()];
        Self {
            polygons,
            properties,
            epsg,
        }
    }

    /// Parse a GeoJSON FeatureCollection.
    ///
    /// Coordinates are assumed to be EPSG:4326 unless the collection carries
    /// a `crs` member naming another EPSG code. Multi-polygons are split into
    /// their parts; non-polygonal geometries are skipped.
    pub fn from_geojson_str(text: &str, origin: &str) -> Result<Self> {
        let geojson: GeoJson = text.parse()?;
        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => return Err(VectorError::NotAFeatureCollection(origin.to_string())),
        };

        let epsg = match collection.foreign_members.as_ref().and_then(|m| m.get("crs")) {
            Some(crs) => parse_crs_member(crs)?,
            None => WGS84_EPSG,
        };

        let mut polygons = Vec::new();
        let mut properties = Vec::new();
        let mut skipped = 0usize;

        for feature in collection.features {
            let props = feature.properties.unwrap_or_default();
            let Some(geometry) = feature.geometry else {
                skipped += 1;
                continue;
            };
            let geometry: Geometry<f64> = geometry.value.try_into()?;
            let parts = polygon_parts(geometry);
            if parts.is_empty() {
                skipped += 1;
            }
            for polygon in parts {
                polygons.push(polygon);
                properties.push(props.clone());
            }
        }

        if skipped > 0 {
            warn!(origin, skipped, "Skipped features without polygon geometry");
        }

        Ok(Self {
            polygons,
            properties,
            epsg,
        })
    }

    /// Read a GeoJSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text, &path.display().to_string())
    }

    /// EPSG code of the coordinates.
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.polygons
    }

    /// Properties of the polygon at `index`.
    pub fn properties(&self, index: usize) -> Option<&JsonObject> {
        self.properties.get(index)
    }

    /// Append a polygon with properties.
    pub fn push(&mut self, polygon: Polygon<f64>, properties: JsonObject) {
        self.polygons.push(polygon);
        self.properties.push(properties);
    }

    /// All polygons as one multi-polygon (no dissolve).
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.polygons.clone())
    }

    /// Bounding box of all polygons, or `None` for an empty layer.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.polygons
            .iter()
            .filter_map(|p| p.bounding_rect())
            .map(|r| BoundingBox::new(r.min().x, r.min().y, r.max().x, r.max().y))
            .reduce(|a, b| a.union(&b))
    }

    /// Reproject every polygon to `epsg`.
    ///
    /// Longitudes out of EPSG:3832 are not wrapped, so a polygon east of the
    /// antimeridian comes back past 180° instead of split across ±180.
    pub fn to_crs(&self, epsg: u32) -> Result<PolygonLayer> {
        if epsg == self.epsg {
            return Ok(self.clone());
        }

        let merc = Mercator::pacific();
        let polygons = match (self.epsg, epsg) {
            (WGS84_EPSG, PACIFIC_EPSG) => self
                .polygons
                .iter()
                .map(|p| {
                    p.map_coords(move |c| {
                        let (x, y) = merc.forward(c.x, c.y);
                        Coord { x, y }
                    })
                })
                .collect(),
            (PACIFIC_EPSG, WGS84_EPSG) => self
                .polygons
                .iter()
                .map(|p| {
                    p.map_coords(move |c| {
                        let (x, y) = merc.inverse_unwrapped(c.x, c.y);
                        Coord { x, y }
                    })
                })
                .collect(),
            (from, to) => {
                return Err(VectorError::UnsupportedCrs(format!(
                    "EPSG:{from} -> EPSG:{to}"
                )))
            }
        };

        Ok(PolygonLayer {
            polygons,
            properties: self.properties.clone(),
            epsg,
        })
    }

    /// Keep the polygons whose `key` property is one of `values`.
    pub fn filter_property(&self, key: &str, values: &[String]) -> PolygonLayer {
        let mut out = PolygonLayer::new(Vec::new(), self.epsg);
        for (polygon, props) in self.polygons.iter().zip(&self.properties) {
            let matches = props
                .get(key)
                .and_then(JsonValue::as_str)
                .is_some_and(|v| values.iter().any(|wanted| wanted == v));
            if matches {
                out.push(polygon.clone(), props.clone());
            }
        }
        out
    }

    /// Country boundaries limited to the given `GID_0` codes (all when `None`).
    pub fn filter_countries(&self, codes: Option<&[String]>) -> PolygonLayer {
        match codes {
            Some(codes) => self.filter_property(COUNTRY_CODE_PROPERTY, codes),
            None => self.clone(),
        }
    }

    /// Serialize as a GeoJSON FeatureCollection.
    ///
    /// Layers outside EPSG:4326 carry a `crs` member so they can be read back.
    pub fn to_geojson_string(&self) -> Result<String> {
        let features = self
            .polygons
            .iter()
            .zip(&self.properties)
            .map(|(polygon, props)| Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(polygon))),
                id: None,
                properties: Some(props.clone()),
                foreign_members: None,
            })
            .collect();

        let foreign_members = if self.epsg == WGS84_EPSG {
            None
        } else {
            let mut members = JsonObject::new();
            members.insert("crs".to_string(), crs_member(self.epsg));
            Some(members)
        };

        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members,
        };
        Ok(serde_json::to_string(&collection)?)
    }

    /// Write as a GeoJSON file, creating parent directories.
    pub fn write_geojson<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }
}

/// Polygonal parts of a geometry.
fn polygon_parts(geometry: Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => vec![p],
        Geometry::MultiPolygon(mp) => mp.0,
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.0.into_iter().flat_map(polygon_parts).collect(),
        _ => Vec::new(),
    }
}

/// Named CRS member in the legacy GeoJSON 2008 form.
fn crs_member(epsg: u32) -> JsonValue {
    serde_json::json!({
        "type": "name",
        "properties": { "name": format!("urn:ogc:def:crs:EPSG::{epsg}") }
    })
}

/// Parse an EPSG code from a `crs` member (`EPSG:3832`, `urn:ogc:def:crs:EPSG::3832`,
/// or the OGC CRS84 alias for WGS84).
fn parse_crs_member(crs: &JsonValue) -> Result<u32> {
    let name = crs
        .pointer("/properties/name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| VectorError::UnsupportedCrs(crs.to_string()))?;

    if name.ends_with("CRS84") {
        return Ok(WGS84_EPSG);
    }
    name.rsplit(':')
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| VectorError::UnsupportedCrs(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use mangroves_grid::wrap_longitude;
    use geo::polygon;

    const COUNTRIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"GID_0": "FJI"},
             "geometry": {"type": "MultiPolygon", "coordinates": [
                [[[177.0, -19.0], [179.0, -19.0], [179.0, -16.0], [177.0, -16.0], [177.0, -19.0]]],
                [[[-180.0, -17.0], [-179.0, -17.0], [-179.0, -16.0], [-180.0, -16.0], [-180.0, -17.0]]]
             ]}},
            {"type": "Feature", "properties": {"GID_0": "WSM"},
             "geometry": {"type": "Polygon", "coordinates":
                [[[-172.8, -14.1], [-171.4, -14.1], [-171.4, -13.4], [-172.8, -13.4], [-172.8, -14.1]]]}},
            {"type": "Feature", "properties": {"GID_0": "XXX"},
             "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}}
        ]
    }"#;

    #[test]
    fn test_parse_splits_multipolygons() {
        let layer = PolygonLayer::from_geojson_str(COUNTRIES, "test").expect("Should parse");
        assert_eq!(layer.epsg(), WGS84_EPSG);
        // Two Fiji parts + Samoa; the point is skipped
        assert_eq!(layer.len(), 3);
        assert_eq!(
            layer.properties(1).and_then(|p| p.get("GID_0")),
            Some(&JsonValue::from("FJI"))
        );
    }

    #[test]
    fn test_not_a_feature_collection() {
        let err = PolygonLayer::from_geojson_str(r#"{"type": "Point", "coordinates": [0, 0]}"#, "p")
            .expect_err("Should reject bare geometry");
        assert!(matches!(err, VectorError::NotAFeatureCollection(_)));
    }

    #[test]
    fn test_filter_countries() {
        let layer = PolygonLayer::from_geojson_str(COUNTRIES, "test").expect("Should parse");

        let fiji = layer.filter_countries(Some(&["FJI".to_string()]));
        assert_eq!(fiji.len(), 2);

        let none = layer.filter_countries(Some(&["TON".to_string()]));
        assert!(none.is_empty());

        let all = layer.filter_countries(None);
        assert_eq!(all.len(), layer.len());
    }

    #[test]
    fn test_to_crs_roundtrip() {
        let layer = PolygonLayer::from_geojson_str(COUNTRIES, "test").expect("Should parse");
        let projected = layer.to_crs(PACIFIC_EPSG).expect("Should project");
        assert_eq!(projected.epsg(), PACIFIC_EPSG);

        let back = projected.to_crs(WGS84_EPSG).expect("Should unproject");
        let original = layer.polygons()[0].exterior().0[0];
        let roundtrip = back.polygons()[0].exterior().0[0];
        assert_abs_diff_eq!(original.x, roundtrip.x, epsilon = 1e-9);
        assert_abs_diff_eq!(original.y, roundtrip.y, epsilon = 1e-9);

        // Samoa is east of 180°, so it comes back unwrapped
        let original = layer.polygons()[2].exterior().0[0];
        let roundtrip = back.polygons()[2].exterior().0[0];
        assert_abs_diff_eq!(original.x + 360.0, roundtrip.x, epsilon = 1e-9);
        assert_abs_diff_eq!(wrap_longitude(roundtrip.x), original.x, epsilon = 1e-9);
        assert_abs_diff_eq!(original.y, roundtrip.y, epsilon = 1e-9);
    }

    #[test]
    fn test_unproject_keeps_antimeridian_polygon_whole() {
        // One polygon from 179°E to 179°W, built in grid space
        let merc = Mercator::pacific();
        let (west, south) = merc.forward(179.0, -17.0);
        let (east, north) = merc.forward(-179.0, -16.0);
        assert!(west < east);
        let square = geo::polygon![
            (x: west, y: south),
            (x: east, y: south),
            (x: east, y: north),
            (x: west, y: north),
            (x: west, y: south),
        ];
        let layer = PolygonLayer::new(vec![square], PACIFIC_EPSG);

        let lonlat = layer.to_crs(WGS84_EPSG).expect("Should unproject");
        let bbox = lonlat.bounding_box().expect("bbox");
        assert_abs_diff_eq!(bbox.min_x, 179.0, epsilon = 1e-9);
        assert_abs_diff_eq!(bbox.max_x, 181.0, epsilon = 1e-9);
        assert!(bbox.max_x - bbox.min_x < 3.0, "Polygon should not span the globe");

        let again = lonlat.to_crs(PACIFIC_EPSG).expect("Should project");
        let bbox = again.bounding_box().expect("bbox");
        assert_abs_diff_eq!(bbox.min_x, west, epsilon = 1e-6);
        assert_abs_diff_eq!(bbox.max_x, east, epsilon = 1e-6);
    }

    #[test]
    fn test_projected_fiji_parts_are_adjacent() {
        let layer = PolygonLayer::from_geojson_str(COUNTRIES, "test").expect("Should parse");
        let fiji = layer
            .filter_countries(Some(&["FJI".to_string()]))
            .to_crs(PACIFIC_EPSG)
            .expect("Should project");

        // In grid space the two halves of Fiji sit side by side rather than
        // at opposite ends of the map
        let bbox = fiji.bounding_box().expect("bbox");
        let (west, _) = Mercator::pacific().forward(177.0, -19.0);
        let (east, _) = Mercator::pacific().forward(-179.0, -19.0);
        assert_abs_diff_eq!(bbox.min_x, west, epsilon = 1e-6);
        assert_abs_diff_eq!(bbox.max_x, east, epsilon = 1e-6);
    }

    #[test]
    fn test_geojson_roundtrip_keeps_crs() {
        let layer = PolygonLayer::from_geojson_str(COUNTRIES, "test")
            .expect("Should parse")
            .to_crs(PACIFIC_EPSG)
            .expect("Should project");

        let text = layer.to_geojson_string().expect("Should serialize");
        assert!(text.contains("urn:ogc:def:crs:EPSG::3832"));

        let reread = PolygonLayer::from_geojson_str(&text, "roundtrip").expect("Should reparse");
        assert_eq!(reread.epsg(), PACIFIC_EPSG);
        assert_eq!(reread.len(), layer.len());
    }

    #[test]
    fn test_parse_crs_member_forms() {
        let crs = serde_json::json!({"type": "name", "properties": {"name": "EPSG:3832"}});
        assert_eq!(parse_crs_member(&crs).expect("EPSG form"), 3832);

        let crs = serde_json::json!({"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}});
        assert_eq!(parse_crs_member(&crs).expect("CRS84 form"), WGS84_EPSG);

        let crs = serde_json::json!({"type": "link"});
        assert!(parse_crs_member(&crs).is_err());
    }

    #[test]
    fn test_unsupported_reprojection() {
        let layer = PolygonLayer::new(Vec::new(), 32760);
        assert!(layer.to_crs(WGS84_EPSG).is_err());
    }
}
