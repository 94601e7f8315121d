//! Senspire Query - read-only spatial and time-series queries
//!
//! Region queries are lazy streams paging through the plot bounding-box
//! index; the exact polygon predicate runs per page. Dropping a stream
//! cancels the scan. Time-window queries use half-open `[from, to)` windows.

pub mod config;
pub mod engine;
pub mod model;
pub mod scan;

pub use config::QueryConfig;
pub use engine::QueryEngine;
pub use model::{FarmSummary, NormalizedReading};
pub use scan::RegionPredicate;
