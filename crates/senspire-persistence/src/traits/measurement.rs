//! Measurement persistence trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use senspire_common::SensorId;

use crate::model::Measurement;

/// Append-only measurement storage keyed by `(sensor_id, timestamp)`
#[async_trait]
pub trait MeasurementPersistence: Send + Sync {
    /// Append a measurement
    async fn measurement_append(&self, measurement: &Measurement) -> anyhow::Result<()>;

    /// Measurements of a sensor with `from <= timestamp < to`, ascending by
    /// timestamp (ties broken by measurement ID)
    async fn measurement_find_range(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Measurement>>;

    /// Number of stored measurements of a sensor
    async fn measurement_count(&self, sensor_id: SensorId) -> anyhow::Result<u64>;

    /// Delete all measurements of a sensor, returning how many were removed
    async fn measurement_delete_by_sensor(&self, sensor_id: SensorId) -> anyhow::Result<u64>;
}
