//! Polygon and point validation.
//!
//! A polygon is accepted when every ring has at least three distinct vertices
//! after collapsing repeated consecutive points, encloses a non-zero area, has
//! no pair of edges crossing or overlapping except adjacent edges at their
//! shared vertex, and every hole lies inside the exterior ring.

use geo::line_intersection::{LineIntersection, line_intersection};
use geo::{Contains, Coord, Line, LineString, Point, Polygon};
use senspire_common::GeometryError;

/// Validate a polygon's topology. Coordinates are not range-checked here,
/// see [`validate_wgs84_bounds`].
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    validate_ring(polygon.exterior(), "exterior")?;

    if !polygon.interiors().is_empty() {
        let shell = Polygon::new(polygon.exterior().clone(), vec![]);
        for (idx, hole) in polygon.interiors().iter().enumerate() {
            let label = format!("interior ring {}", idx);
            validate_ring(hole, &label)?;
            if !shell.contains(hole) {
                return Err(GeometryError::Degenerate(format!(
                    "{} is not inside the exterior ring",
                    label
                )));
            }
        }
    }

    Ok(())
}

/// Check every coordinate is a WGS84 longitude/latitude pair.
pub fn validate_wgs84_bounds(polygon: &Polygon<f64>) -> Result<(), GeometryError> {
    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors().iter());
    for ring in rings {
        for c in ring.coords() {
            check_lng_lat(c.x, c.y)?;
        }
    }
    Ok(())
}

/// Validate a farm location point (finite and within WGS84 bounds).
pub fn validate_point(point: &Point<f64>) -> Result<(), GeometryError> {
    if !point.x().is_finite() || !point.y().is_finite() {
        return Err(GeometryError::Degenerate(
            "point has a non-finite coordinate".to_string(),
        ));
    }
    check_lng_lat(point.x(), point.y())
}

fn check_lng_lat(lng: f64, lat: f64) -> Result<(), GeometryError> {
    if !(-180.0..=180.0).contains(&lng) {
        return Err(GeometryError::OutOfBounds(format!(
            "longitude {} outside [-180, 180]",
            lng
        )));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeometryError::OutOfBounds(format!(
            "latitude {} outside [-90, 90]",
            lat
        )));
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>, label: &str) -> Result<(), GeometryError> {
    if ring.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GeometryError::Degenerate(format!(
            "{} has a non-finite coordinate",
            label
        )));
    }

    let vertices = distinct_vertices(ring);
    if vertices.len() < 3 {
        return Err(GeometryError::TooFewVertices(vertices.len()));
    }

    if all_collinear(&vertices) {
        return Err(GeometryError::Degenerate(format!(
            "{} encloses zero area",
            label
        )));
    }

    check_simple(&vertices)
}

/// Ring vertices with consecutive repeats and the closing point removed.
fn distinct_vertices(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in ring.coords() {
        if out.last() != Some(c) {
            out.push(*c);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

fn all_collinear(vertices: &[Coord<f64>]) -> bool {
    let origin = vertices[0];
    let axis = vertices[1] - origin;
    vertices[2..].iter().all(|v| {
        let d = *v - origin;
        axis.x * d.y - axis.y * d.x == 0.0
    })
}

fn check_simple(vertices: &[Coord<f64>]) -> Result<(), GeometryError> {
    let n = vertices.len();
    let edges: Vec<Line<f64>> = (0..n)
        .map(|i| Line::new(vertices[i], vertices[(i + 1) % n]))
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::Collinear { intersection })
                    if adjacent && intersection.start == intersection.end => {}
                Some(_) => {
                    tracing::debug!(edge_a = i, edge_b = j, "ring edges intersect");
                    return Err(GeometryError::SelfIntersecting);
                }
            }
        }
    }
    Ok(())
}
