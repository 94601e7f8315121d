//! Senspire Persistence - Domain records and storage backends
//!
//! This crate provides:
//! - Domain records for the containment tree (farm, plot, sensor, measurement)
//! - Persistence trait abstractions shared by every backend
//! - An in-memory backend for standalone deployments and tests
//! - SeaORM entity definitions and a relational backend (MySQL/PostgreSQL/SQLite)

pub mod entity;
pub mod memory;
pub mod model;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export persistence traits
pub use traits::{HierarchyPersistence, MeasurementPersistence, PersistenceService};

// Re-export backends
pub use memory::{GridIndex, MemoryPersistService};
pub use sql::ExternalDbPersistService;
pub use sql::schema::create_schema;

// Re-export model types
pub use model::{Farm, Measurement, Plot, PlotPage, Sensor, StorageMode};
