//! The geometry store facade.

use geo::orient::{Direction, Orient};
use geo::{Area, GeodesicArea, Intersects, Point, Polygon, Within};
use serde::{Deserialize, Serialize};
use senspire_common::GeometryError;

use crate::bbox::BBox;
use crate::validate::{validate_point, validate_polygon, validate_wgs84_bounds};

/// How polygon areas are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaMethod {
    /// Square metres on the WGS84 ellipsoid
    #[default]
    Geodesic,
    /// Shoelace area in input units
    Planar,
}

impl AreaMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaMethod::Geodesic => "geodesic",
            AreaMethod::Planar => "planar",
        }
    }
}

impl std::fmt::Display for AreaMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AreaMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geodesic" => Ok(AreaMethod::Geodesic),
            "planar" => Ok(AreaMethod::Planar),
            _ => Err(format!("Invalid area method: {}", s)),
        }
    }
}

/// Unsigned area of a polygon, holes subtracted.
pub fn compute_area(polygon: &Polygon<f64>, method: AreaMethod) -> f64 {
    match method {
        AreaMethod::Planar => polygon.unsigned_area(),
        AreaMethod::Geodesic => polygon
            .orient(Direction::Default)
            .geodesic_area_unsigned(),
    }
}

/// Area and bounding box of a validated polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonMeasure {
    pub area: f64,
    pub bbox: BBox,
}

/// Stateless geometry operations bound to one area method.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryStore {
    method: AreaMethod,
}

impl GeometryStore {
    pub fn new(method: AreaMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> AreaMethod {
        self.method
    }

    /// Validate topology, plus WGS84 bounds when measuring geodesically.
    pub fn validate_polygon(&self, polygon: &Polygon<f64>) -> Result<(), GeometryError> {
        validate_polygon(polygon)?;
        if self.method == AreaMethod::Geodesic {
            validate_wgs84_bounds(polygon)?;
        }
        Ok(())
    }

    pub fn validate_point(&self, point: &Point<f64>) -> Result<(), GeometryError> {
        validate_point(point)
    }

    /// Area of a polygon. The caller is expected to have validated it.
    pub fn compute_area(&self, polygon: &Polygon<f64>) -> f64 {
        compute_area(polygon, self.method)
    }

    /// Validate, then compute area and bounding box in one pass.
    pub fn measure(&self, polygon: &Polygon<f64>) -> Result<PolygonMeasure, GeometryError> {
        self.validate_polygon(polygon)?;
        let area = self.compute_area(polygon);
        if !area.is_finite() || area <= 0.0 {
            return Err(GeometryError::Degenerate(format!(
                "polygon area {} is not positive",
                area
            )));
        }
        let bbox = BBox::from_polygon(polygon)
            .ok_or_else(|| GeometryError::Degenerate("polygon is empty".to_string()))?;
        Ok(PolygonMeasure { area, bbox })
    }

    /// Point containment, boundary inclusive.
    pub fn point_in_polygon(&self, point: &Point<f64>, polygon: &Polygon<f64>) -> bool {
        polygon.intersects(point)
    }

    /// Whether `inner` lies entirely within `outer`.
    pub fn polygon_within(&self, inner: &Polygon<f64>, outer: &Polygon<f64>) -> bool {
        inner.is_within(outer)
    }

    pub fn polygons_intersect(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
        a.intersects(b)
    }
}
