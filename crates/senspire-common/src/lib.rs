//! Senspire Common - Shared types, error taxonomy, and utilities
//!
//! This crate provides the foundational types used across all Senspire components:
//! - Error types and error codes
//! - Closed enums for soil, crop, sensor type and sensor status
//! - Entity identifiers
//! - Unit conversion into canonical sensor units
//! - Time bucketing helpers used by measurement deduplication

pub mod error;
pub mod types;
pub mod units;
pub mod utils;

// Re-exports for convenience
pub use error::{ErrorCode, GeometryError, SenspireError};
pub use types::*;
pub use units::{is_canonical, to_canonical};
pub use utils::{now_utc, resolution_bucket, truncate_to_resolution};

/// Result alias used by component entry points
pub type Result<T> = std::result::Result<T, SenspireError>;

/// Identifier of a farm
pub type FarmId = uuid::Uuid;

/// Identifier of a plot
pub type PlotId = uuid::Uuid;

/// Identifier of a sensor
pub type SensorId = uuid::Uuid;

/// Identifier of a stored measurement
pub type MeasurementId = uuid::Uuid;

/// Default capacity of a per-sensor ingestion queue
pub const DEFAULT_INGEST_QUEUE_CAPACITY: usize = 1024;

/// Default deduplication bucket width in milliseconds
pub const DEFAULT_DEDUP_RESOLUTION_MS: u64 = 1000;

/// Default tolerance when comparing duplicate measurement values
pub const DEFAULT_VALUE_EPSILON: f64 = 1e-9;

/// Default bounded wait for a per-farm mutation lock
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2000;

/// Default number of optimistic attempts for farm area recomputation
pub const DEFAULT_MAX_RECOMPUTE_ATTEMPTS: u32 = 5;

/// Default page size of spatial scans
pub const DEFAULT_SCAN_BATCH_SIZE: u64 = 256;
