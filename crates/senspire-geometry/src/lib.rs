//! Geometry store for Senspire.
//!
//! All geometry is WGS84 (EPSG:4326) with `x = longitude`, `y = latitude`.
//! Every operation here is a pure function of its inputs: no shared state,
//! deterministic, safe to call from any number of threads.
//!
//! # Area
//!
//! Two documented methods are supported, selected by [`AreaMethod`]:
//!
//! - [`AreaMethod::Geodesic`] (default): area on the WGS84 ellipsoid in square
//!   metres, using Karney's geodesic polygon algorithm. Rings are oriented
//!   (exterior counter-clockwise, holes clockwise) before measuring, so the
//!   input winding never changes the result.
//! - [`AreaMethod::Planar`]: unsigned shoelace area in the units of the input
//!   coordinates. Use it when coordinates have already been projected to an
//!   equal-area projection.
//!
//! # Modules
//!
//! - [`bbox`]: axis-aligned bounding boxes used for spatial prefiltering
//! - [`store`]: the [`GeometryStore`] facade and area computation
//! - [`validate`]: polygon and point validation
//! - [`text`]: WKT encoding used by the relational backend

pub mod bbox;
pub mod store;
pub mod text;
pub mod validate;

pub use bbox::BBox;
pub use geo_types::{Coord, LineString, Point, Polygon, coord, point, polygon};
pub use store::{AreaMethod, GeometryStore, PolygonMeasure, compute_area};
pub use text::{parse_polygon_wkt, polygon_to_wkt};
pub use validate::{validate_point, validate_polygon, validate_wgs84_bounds};
