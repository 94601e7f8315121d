//! Senspire Server - hosts the geospatial aggregation and ingestion engine
//!
//! Wires a storage backend, the hierarchy manager, the ingestion pipeline and
//! the query engine from [`config::Configuration`], and provides the
//! logging/metrics bootstrap used by the `senspire-server` binary.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod startup;

pub use config::{Cli, Configuration};
pub use engine::{Engine, EngineConfig};
