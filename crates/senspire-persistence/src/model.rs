//! Domain records for the persistence abstraction layer
//!
//! These types are returned by the persistence traits and are decoupled from
//! specific storage backends.

use chrono::{DateTime, Utc};
use geo_types::{Point, Polygon};
use serde::{Deserialize, Serialize};

use senspire_common::{
    CropType, FarmId, MeasurementId, PlotId, SensorId, SensorStatus, SensorType, SoilType,
};
use senspire_geometry::BBox;

/// Storage mode for the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Process-local maps, nothing survives a restart
    #[default]
    Memory,
    /// External database (MySQL/PostgreSQL/SQLite via SeaORM)
    ExternalDb,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Memory => write!(f, "memory"),
            StorageMode::ExternalDb => write!(f, "database"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StorageMode::Memory),
            "database" | "external_db" => Ok(StorageMode::ExternalDb),
            _ => Err(format!("Invalid storage mode: {}", s)),
        }
    }
}

/// A farm owned by an external account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Farm {
    pub id: FarmId,
    /// Opaque reference to the owning account
    pub owner_id: String,
    pub name: String,
    /// WGS84 location, `x = longitude`, `y = latitude`
    pub location: Point<f64>,
    /// Sum of plot areas; `None` while the farm has no plots
    pub total_area: Option<f64>,
    /// Incremented on every change to the farm's plot set
    pub revision: u64,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for Farm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.owner_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plot {
    pub id: PlotId,
    pub farm_id: FarmId,
    pub name: String,
    pub perimeter: Polygon<f64>,
    /// Derived from `perimeter` at last save
    pub area: Option<f64>,
    pub bbox: BBox,
    pub soil_type: SoilType,
    pub crop_type: CropType,
    pub created_at: DateTime<Utc>,
}

/// One keyset page of a spatial plot scan
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlotPage {
    pub plots: Vec<Plot>,
    /// Cursor to resume after; `None` once the index is exhausted.
    ///
    /// Taken from the index walk, so it can be set even when `plots` came
    /// back short because rows vanished concurrently.
    pub next: Option<PlotId>,
}

impl std::fmt::Display for Plot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {}", self.name, self.crop_type.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: SensorId,
    pub plot_id: PlotId,
    pub sensor_type: SensorType,
    pub model: String,
    pub last_calibration: DateTime<Utc>,
    pub status: SensorStatus,
}

impl Sensor {
    /// Human readable description, e.g. `pH (North field)`
    pub fn describe(&self, plot_name: &str) -> String {
        format!("{} ({})", self.sensor_type.label(), plot_name)
    }
}

/// An immutable stored reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: MeasurementId,
    pub sensor_id: SensorId,
    pub value: f64,
    pub unit: String,
    /// Observation time, the ordering key within a sensor
    pub timestamp: DateTime<Utc>,
    /// Server clock when the record was written
    pub ingested_at: DateTime<Utc>,
    /// Set when the sensor was not active at ingestion
    pub flagged: bool,
}

impl Measurement {
    pub fn describe(&self, sensor_type: SensorType) -> String {
        format!("{}: {}{}", sensor_type, self.value, self.unit)
    }
}
