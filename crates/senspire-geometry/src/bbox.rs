//! Axis-aligned bounding boxes.

use geo::BoundingRect;
use geo_types::{Point, Polygon};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in WGS84 degrees (or projected units for planar input).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BBox {
    /// Create a new bounding box.
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Degenerate box covering a single point.
    pub fn from_point(point: &Point<f64>) -> Self {
        Self::new(point.y(), point.y(), point.x(), point.x())
    }

    /// Compute from a polygon; `None` for an empty polygon.
    pub fn from_polygon(polygon: &Polygon<f64>) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        Some(Self {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }

    /// Check if this bbox intersects another (touching edges count).
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lng <= other.max_lng
            && self.max_lng >= other.min_lng
    }

    /// Check if this bbox contains a point.
    pub fn contains_point(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }

    /// Check if this bbox fully contains another bbox.
    pub fn contains_bbox(&self, other: &BBox) -> bool {
        self.min_lat <= other.min_lat
            && self.max_lat >= other.max_lat
            && self.min_lng <= other.min_lng
            && self.max_lng >= other.max_lng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    #[test]
    fn test_bbox_from_polygon() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 20.0), (x: 0.0, y: 20.0)];
        let bbox = BBox::from_polygon(&poly).unwrap();
        assert_eq!(bbox.min_lng, 0.0);
        assert_eq!(bbox.max_lng, 10.0);
        assert_eq!(bbox.min_lat, 0.0);
        assert_eq!(bbox.max_lat, 20.0);
    }

    #[test]
    fn test_bbox_relations() {
        let outer = BBox::new(0.0, 10.0, 0.0, 10.0);
        let inner = BBox::new(2.0, 3.0, 2.0, 3.0);
        let touching = BBox::new(10.0, 12.0, 0.0, 1.0);
        let apart = BBox::new(11.0, 12.0, 11.0, 12.0);

        assert!(outer.contains_bbox(&inner));
        assert!(!inner.contains_bbox(&outer));
        assert!(outer.intersects(&touching));
        assert!(!outer.intersects(&apart));
        assert!(outer.contains_point(5.0, 5.0));
        assert!(!outer.contains_point(5.0, 10.5));
    }
}
