//! WKT encoding of polygons.

use geo_types::Polygon;
use senspire_common::GeometryError;
use wkt::{ToWkt, TryFromWkt};

/// Parse a `POLYGON(...)` WKT string.
pub fn parse_polygon_wkt(text: &str) -> Result<Polygon<f64>, GeometryError> {
    Polygon::<f64>::try_from_wkt_str(text)
        .map_err(|e| GeometryError::Malformed(format!("{:?}", e)))
}

/// Encode a polygon as WKT.
pub fn polygon_to_wkt(polygon: &Polygon<f64>) -> String {
    polygon.wkt_string()
}
