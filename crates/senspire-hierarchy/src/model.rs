// Request and snapshot types for the hierarchy manager

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use senspire_common::{
    CropType, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_MAX_RECOMPUTE_ATTEMPTS, SenspireError,
    SensorStatus, SensorType, SoilType,
};
use senspire_geometry::{Point, Polygon};
use senspire_persistence::{Farm, Plot, Sensor};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_MODEL_LEN: usize = 100;

/// Hierarchy manager tuning
#[derive(Debug, Clone, Copy)]
pub struct HierarchyConfig {
    /// Bounded wait for a farm lock before failing with `Overloaded`
    pub lock_timeout: Duration,
    /// Optimistic attempts of a farm total recomputation
    pub max_recompute_attempts: u32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            max_recompute_attempts: DEFAULT_MAX_RECOMPUTE_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFarm {
    pub owner_id: String,
    pub name: String,
    pub location: Point<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlot {
    pub name: String,
    pub perimeter: Polygon<f64>,
    pub soil_type: SoilType,
    pub crop_type: CropType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSensor {
    pub sensor_type: SensorType,
    pub model: String,
    /// Defaults to the attach time
    pub last_calibration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: SensorStatus,
}

/// Farm with its plots and sensors, read under the farm's read lock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmSnapshot {
    pub farm: Farm,
    pub plots: Vec<Plot>,
    pub sensors: Vec<Sensor>,
}

impl FarmSnapshot {
    pub fn active_sensor_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.status.is_active()).count()
    }
}

pub(crate) fn check_text(field: &str, value: &str, max_len: usize) -> Result<(), SenspireError> {
    if value.trim().is_empty() {
        return Err(SenspireError::IllegalArgument(format!(
            "{} must not be blank",
            field
        )));
    }
    if value.chars().count() > max_len {
        return Err(SenspireError::IllegalArgument(format!(
            "{} exceeds {} characters",
            field, max_len
        )));
    }
    Ok(())
}
