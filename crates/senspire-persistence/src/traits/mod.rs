//! Persistence traits for the unified storage abstraction layer
//!
//! These traits abstract over the in-memory backend and the external database
//! backend (MySQL/PostgreSQL/SQLite). Cascading deletes are not performed here:
//! each method touches exactly the rows it names, and the hierarchy manager
//! composes them into explicit cascades.

pub mod hierarchy;
pub mod measurement;

pub use hierarchy::HierarchyPersistence;
pub use measurement::MeasurementPersistence;

use async_trait::async_trait;

use crate::model::StorageMode;

/// Unified persistence service trait
#[async_trait]
pub trait PersistenceService: HierarchyPersistence + MeasurementPersistence + Send + Sync {
    /// Get the current storage mode
    fn storage_mode(&self) -> StorageMode;

    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;
}
