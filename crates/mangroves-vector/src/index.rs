//! R-tree index over polygon envelopes.

use crate::PolygonLayer;
use geo::{BooleanOps, BoundingRect, Contains, Intersects, MultiPolygon, Polygon};
use mangroves_grid::BoundingBox;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Spatial index for fast "does anything here intersect?" queries.
///
/// Candidates are found by envelope in the R-tree, then confirmed with an
/// exact polygon intersection test.
#[derive(Debug)]
pub struct PolygonIndex {
    layer: PolygonLayer,
    tree: RTree<IndexedEnvelope>,
}

impl PolygonIndex {
    /// Build an index over every polygon in the layer.
    pub fn new(layer: PolygonLayer) -> Self {
        let envelopes = layer
            .polygons()
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                p.bounding_rect().map(|r| {
                    GeomWithData::new(
                        Rectangle::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
                        i,
                    )
                })
            })
            .collect();

        Self {
            layer,
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// The indexed layer.
    pub fn layer(&self) -> &PolygonLayer {
        &self.layer
    }

    /// EPSG code of the indexed polygons.
    pub fn epsg(&self) -> u32 {
        self.layer.epsg()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Indices of polygons whose envelope intersects `bbox`.
    pub fn candidates(&self, bbox: &BoundingBox) -> Vec<usize> {
        let envelope = AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Whether any indexed polygon intersects `query`.
    pub fn intersects(&self, query: &Polygon<f64>) -> bool {
        let Some(bbox) = envelope_of(query) else {
            return false;
        };
        self.candidates(&bbox)
            .into_iter()
            .any(|i| self.layer.polygons()[i].intersects(query))
    }

    /// Whether any indexed polygon intersects the bounding box.
    pub fn intersects_bbox(&self, bbox: &BoundingBox) -> bool {
        let rect = geo::Rect::new(
            geo::coord! { x: bbox.min_x, y: bbox.min_y },
            geo::coord! { x: bbox.max_x, y: bbox.max_y },
        );
        self.intersects(&rect.to_polygon())
    }

    /// The parts of the indexed polygons that fall inside `query`.
    pub fn intersection(&self, query: &Polygon<f64>) -> MultiPolygon<f64> {
        let Some(bbox) = envelope_of(query) else {
            return MultiPolygon::new(Vec::new());
        };

        let mut parts = Vec::new();
        for i in self.candidates(&bbox) {
            let polygon = &self.layer.polygons()[i];
            if query.contains(polygon) {
                parts.push(polygon.clone());
            } else if polygon.intersects(query) {
                parts.extend(polygon.intersection(query).0);
            }
        }
        MultiPolygon::new(parts)
    }
}

fn envelope_of(polygon: &Polygon<f64>) -> Option<BoundingBox> {
    polygon
        .bounding_rect()
        .map(|r| BoundingBox::new(r.min().x, r.min().y, r.max().x, r.max().y))
}
