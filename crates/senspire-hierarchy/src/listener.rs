// Notification seam for cascading sensor removal

use async_trait::async_trait;

use senspire_common::SensorId;

/// Observer of sensor removal.
///
/// Called after the sensor rows are gone and before their measurements are
/// purged, so components buffering per-sensor work can drain it first.
#[async_trait]
pub trait SensorLifecycleListener: Send + Sync {
    async fn on_sensors_removed(&self, sensor_ids: &[SensorId]) -> anyhow::Result<()>;
}
