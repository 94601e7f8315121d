//! Configuration management for the Senspire host
//!
//! Sources, in increasing precedence: built-in defaults, the YAML file,
//! `SENSPIRE__*` environment variables (`__` separates key segments, e.g.
//! `SENSPIRE__INGEST__QUEUE_CAPACITY`), and command line overrides.

use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use config::{Config, Environment};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use senspire_common::{
    DEFAULT_DEDUP_RESOLUTION_MS, DEFAULT_INGEST_QUEUE_CAPACITY, DEFAULT_LOCK_TIMEOUT_MS,
    DEFAULT_MAX_RECOMPUTE_ATTEMPTS, DEFAULT_SCAN_BATCH_SIZE, DEFAULT_VALUE_EPSILON,
};
use senspire_geometry::AreaMethod;
use senspire_hierarchy::HierarchyConfig;
use senspire_ingest::IngestConfig;
use senspire_persistence::StorageMode;
use senspire_query::QueryConfig;

use crate::startup::LoggingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";

pub const STORAGE_MODE: &str = "senspire.storage.mode";
pub const STORAGE_URL: &str = "senspire.storage.url";
pub const STORAGE_MAX_CONNECTIONS: &str = "senspire.storage.max_connections";
pub const STORAGE_MIGRATE: &str = "senspire.storage.migrate";
pub const GEOMETRY_AREA_METHOD: &str = "senspire.geometry.area_method";
pub const HIERARCHY_LOCK_TIMEOUT_MS: &str = "senspire.hierarchy.lock_timeout_ms";
pub const HIERARCHY_MAX_RECOMPUTE_ATTEMPTS: &str = "senspire.hierarchy.max_recompute_attempts";
pub const INGEST_QUEUE_CAPACITY: &str = "senspire.ingest.queue_capacity";
pub const INGEST_DEDUP_RESOLUTION_MS: &str = "senspire.ingest.dedup_resolution_ms";
pub const INGEST_VALUE_EPSILON: &str = "senspire.ingest.value_epsilon";
pub const INGEST_FLAG_NON_ACTIVE: &str = "senspire.ingest.flag_non_active";
pub const QUERY_SCAN_BATCH_SIZE: &str = "senspire.query.scan_batch_size";
pub const LOGS_PATH: &str = "senspire.logs.path";
pub const LOGS_LEVEL: &str = "senspire.logs.level";
pub const LOGS_CONSOLE: &str = "senspire.logs.console";
pub const LOGS_FILE: &str = "senspire.logs.file";
pub const STATS_REPORT_INTERVAL_SECS: &str = "senspire.stats.report_interval_secs";

const DEFAULT_MAX_CONNECTIONS: i64 = 10;
const DEFAULT_STATS_REPORT_INTERVAL_SECS: i64 = 60;

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "senspire-server", version, about)]
pub struct Cli {
    /// Configuration file (YAML); missing files are ignored
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,
    /// Storage mode: memory or database
    #[arg(short = 's', long = "storage")]
    pub storage: Option<String>,
    #[arg(long = "db-url", env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load from the process arguments and environment
    pub fn new() -> anyhow::Result<Self> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(config::File::with_name(&cli.config_file).required(false))
            .add_source(
                Environment::with_prefix("senspire")
                    .prefix_separator("__")
                    .separator("__")
                    .keep_prefix(true)
                    .try_parsing(true),
            );

        if let Some(v) = cli.storage {
            builder = builder.set_override(STORAGE_MODE, v)?;
        }
        if let Some(v) = cli.database_url {
            builder = builder.set_override(STORAGE_URL, v)?;
        }

        let config = builder
            .build()
            .with_context(|| format!("failed to load configuration from {}", cli.config_file))?;
        let configuration = Self::from_config(config);
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    /// Reject settings the engine cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage_mode()? == StorageMode::ExternalDb && self.storage_url().is_none() {
            return Err(anyhow!("{} is required for database storage", STORAGE_URL));
        }
        self.area_method()?;
        if self.ingest_config().queue_capacity == 0 {
            return Err(anyhow!("{} must be positive", INGEST_QUEUE_CAPACITY));
        }
        if self.ingest_config().dedup_resolution.is_zero() {
            return Err(anyhow!("{} must be positive", INGEST_DEDUP_RESOLUTION_MS));
        }
        let epsilon = self.ingest_config().value_epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(anyhow!(
                "{} must be a finite non-negative number, got {}",
                INGEST_VALUE_EPSILON,
                epsilon
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Storage Configuration
    // ========================================================================

    pub fn storage_mode(&self) -> anyhow::Result<StorageMode> {
        match self.config.get_string(STORAGE_MODE) {
            Ok(v) => v.parse().map_err(|e: String| anyhow!(e)),
            Err(_) => Ok(StorageMode::default()),
        }
    }

    pub fn storage_url(&self) -> Option<String> {
        self.config.get_string(STORAGE_URL).ok()
    }

    pub fn storage_max_connections(&self) -> u32 {
        self.config
            .get_int(STORAGE_MAX_CONNECTIONS)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
            .max(1) as u32
    }

    /// Create tables and indexes on startup
    pub fn storage_migrate(&self) -> bool {
        self.config.get_bool(STORAGE_MIGRATE).unwrap_or(true)
    }

    pub async fn database_connection(&self) -> anyhow::Result<DatabaseConnection> {
        let url = self
            .storage_url()
            .ok_or_else(|| anyhow!("{} is not set", STORAGE_URL))?;

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(self.storage_max_connections())
            .min_connections(1)
            .connect_timeout(Duration::from_secs(30))
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        Ok(Database::connect(opt).await?)
    }

    // ========================================================================
    // Component Configuration
    // ========================================================================

    pub fn area_method(&self) -> anyhow::Result<AreaMethod> {
        match self.config.get_string(GEOMETRY_AREA_METHOD) {
            Ok(v) => v.parse().map_err(|e: String| anyhow!(e)),
            Err(_) => Ok(AreaMethod::default()),
        }
    }

    pub fn hierarchy_config(&self) -> HierarchyConfig {
        HierarchyConfig {
            lock_timeout: Duration::from_millis(
                self.config
                    .get_int(HIERARCHY_LOCK_TIMEOUT_MS)
                    .map(|v| v.max(0) as u64)
                    .unwrap_or(DEFAULT_LOCK_TIMEOUT_MS),
            ),
            max_recompute_attempts: self
                .config
                .get_int(HIERARCHY_MAX_RECOMPUTE_ATTEMPTS)
                .map(|v| v.max(1) as u32)
                .unwrap_or(DEFAULT_MAX_RECOMPUTE_ATTEMPTS),
        }
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            queue_capacity: self
                .config
                .get_int(INGEST_QUEUE_CAPACITY)
                .map(|v| v.max(0) as usize)
                .unwrap_or(DEFAULT_INGEST_QUEUE_CAPACITY),
            dedup_resolution: Duration::from_millis(
                self.config
                    .get_int(INGEST_DEDUP_RESOLUTION_MS)
                    .map(|v| v.max(0) as u64)
                    .unwrap_or(DEFAULT_DEDUP_RESOLUTION_MS),
            ),
            value_epsilon: self
                .config
                .get_float(INGEST_VALUE_EPSILON)
                .unwrap_or(DEFAULT_VALUE_EPSILON),
            flag_non_active: self.config.get_bool(INGEST_FLAG_NON_ACTIVE).unwrap_or(true),
            ..IngestConfig::default()
        }
    }

    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            scan_batch_size: self
                .config
                .get_int(QUERY_SCAN_BATCH_SIZE)
                .map(|v| v.max(1) as u64)
                .unwrap_or(DEFAULT_SCAN_BATCH_SIZE),
        }
    }

    // ========================================================================
    // Host Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string(LOGS_PATH).ok(),
            self.config.get_bool(LOGS_CONSOLE).unwrap_or(true),
            self.config.get_bool(LOGS_FILE).unwrap_or(false),
            self.config
                .get_string(LOGS_LEVEL)
                .unwrap_or("info".to_string()),
        )
    }

    pub fn stats_report_interval(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int(STATS_REPORT_INTERVAL_SECS)
                .unwrap_or(DEFAULT_STATS_REPORT_INTERVAL_SECS)
                .max(1) as u64,
        )
    }
}
