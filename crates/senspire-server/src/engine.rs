//! Engine wiring
//!
//! One storage backend is shared by the hierarchy manager, the ingestion
//! pipeline and the query engine. The pipeline is registered as a sensor
//! lifecycle listener so cascading deletes retire its lanes.

use std::sync::Arc;

use tracing::info;

use senspire_geometry::{AreaMethod, GeometryStore};
use senspire_hierarchy::{HierarchyConfig, HierarchyManager};
use senspire_ingest::{IngestConfig, IngestPipeline};
use senspire_persistence::{
    ExternalDbPersistService, MemoryPersistService, PersistenceService, StorageMode,
    create_schema,
};
use senspire_query::{QueryConfig, QueryEngine};

use crate::config::Configuration;

/// Component settings of an [`Engine`]
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub area_method: AreaMethod,
    pub hierarchy: HierarchyConfig,
    pub ingest: IngestConfig,
    pub query: QueryConfig,
}

impl EngineConfig {
    pub fn from_configuration(configuration: &Configuration) -> anyhow::Result<Self> {
        Ok(Self {
            area_method: configuration.area_method()?,
            hierarchy: configuration.hierarchy_config(),
            ingest: configuration.ingest_config(),
            query: configuration.query_config(),
        })
    }
}

/// The four engine components over one storage backend
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn PersistenceService>,
    hierarchy: Arc<HierarchyManager>,
    pipeline: IngestPipeline,
    query: QueryEngine,
}

impl Engine {
    pub fn new(store: Arc<dyn PersistenceService>, config: EngineConfig) -> Self {
        let hierarchy = Arc::new(HierarchyManager::new(
            store.clone(),
            GeometryStore::new(config.area_method),
            config.hierarchy,
        ));
        let pipeline = IngestPipeline::new(hierarchy.clone(), config.ingest);
        hierarchy.add_listener(Arc::new(pipeline.clone()));
        let query = QueryEngine::new(hierarchy.clone(), config.query);

        Self {
            store,
            hierarchy,
            pipeline,
            query,
        }
    }

    /// In-memory engine
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Arc::new(MemoryPersistService::new()), config)
    }

    /// Build the storage backend and engine described by `configuration`
    pub async fn from_configuration(configuration: &Configuration) -> anyhow::Result<Self> {
        let config = EngineConfig::from_configuration(configuration)?;
        let storage_mode = configuration.storage_mode()?;
        info!("Persistence mode: {}", storage_mode);

        let store: Arc<dyn PersistenceService> = match storage_mode {
            StorageMode::Memory => Arc::new(MemoryPersistService::new()),
            StorageMode::ExternalDb => {
                let db = configuration.database_connection().await?;
                if configuration.storage_migrate() {
                    create_schema(&db).await?;
                    info!("Database schema ensured");
                }
                Arc::new(ExternalDbPersistService::new(db))
            }
        };
        store.health_check().await?;

        info!(
            area_method = %config.area_method,
            queue_capacity = config.ingest.queue_capacity,
            scan_batch_size = config.query.scan_batch_size,
            "Engine initialized"
        );
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &Arc<dyn PersistenceService> {
        &self.store
    }

    pub fn hierarchy(&self) -> &Arc<HierarchyManager> {
        &self.hierarchy
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    pub fn query(&self) -> &QueryEngine {
        &self.query
    }

    pub async fn health_check(&self) -> anyhow::Result<()> {
        self.store.health_check().await
    }

    /// Drain every ingestion lane
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
        info!("Engine stopped");
    }
}
