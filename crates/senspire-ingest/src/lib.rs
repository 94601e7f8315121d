//! Senspire Ingest - Measurement ingestion pipeline
//!
//! Readings are validated at submission (sensor exists, value finite and
//! plausible) and then handed to a bounded per-sensor lane. Each lane has a
//! single writer task, so a sensor's records are deduplicated and appended
//! without locks and without contending with any other sensor. A full lane
//! fails the submission with `Overloaded` instead of blocking the caller.
//!
//! Stored measurements are ordered by observation timestamp, not arrival
//! order, so late readings land in their correct place.

pub mod config;
pub mod lane;
pub mod pipeline;
pub mod stats;

pub use config::{IngestConfig, RangeTable};
pub use pipeline::{IngestOutcome, IngestPipeline, PendingMeasurement, Reading};
pub use stats::{IngestStats, IngestStatsSnapshot};
