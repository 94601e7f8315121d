// Measurement ingestion pipeline

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use senspire_common::{
    MeasurementId, Result, SenspireError, SensorId, now_utc, to_canonical,
};
use senspire_hierarchy::{HierarchyManager, SensorLifecycleListener};

use crate::config::IngestConfig;
use crate::lane::{Job, LaneContext, SensorLane};
use crate::stats::{IngestStats, IngestStatsSnapshot};

/// Longest accepted unit string
pub const MAX_UNIT_LEN: usize = 20;

/// Earliest accepted observation time, 1900-01-01T00:00:00Z
pub const MIN_OBSERVED_AT_SECS: i64 = -2_208_988_800;

/// Observation times from 9999-01-01T00:00:00Z on are rejected
pub const MAX_OBSERVED_AT_SECS: i64 = 253_370_764_800;

/// A raw reading from a sensor gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub sensor_id: SensorId,
    pub value: f64,
    pub unit: String,
    /// Observation time; the server clock is used when absent
    pub observed_at: Option<DateTime<Utc>>,
}

/// Result of an accepted reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome", content = "measurementId")]
pub enum IngestOutcome {
    /// Newly stored
    Stored(MeasurementId),
    /// Absorbed; carries the ID of the measurement already stored
    Duplicate(MeasurementId),
}

impl IngestOutcome {
    pub fn id(&self) -> MeasurementId {
        match self {
            IngestOutcome::Stored(id) | IngestOutcome::Duplicate(id) => *id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate(_))
    }
}

/// A reading queued on its sensor's lane
pub struct PendingMeasurement {
    sensor_id: SensorId,
    rx: oneshot::Receiver<Result<IngestOutcome>>,
}

impl PendingMeasurement {
    pub fn sensor_id(&self) -> SensorId {
        self.sensor_id
    }

    /// Wait for the lane's writer to store or absorb the reading
    pub async fn wait(self) -> Result<IngestOutcome> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(SenspireError::Storage(format!(
                "ingestion lane of sensor '{}' stopped",
                self.sensor_id
            ))),
        }
    }
}

struct Inner {
    ctx: Arc<LaneContext>,
    lanes: DashMap<SensorId, SensorLane>,
    closed: AtomicBool,
}

/// Measurement ingestion pipeline
///
/// Cheap to clone; clones share lanes and counters.
#[derive(Clone)]
pub struct IngestPipeline {
    inner: Arc<Inner>,
}

impl IngestPipeline {
    pub fn new(hierarchy: Arc<HierarchyManager>, config: IngestConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx: Arc::new(LaneContext {
                    hierarchy,
                    config,
                    stats: Arc::new(IngestStats::default()),
                }),
                lanes: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.ctx.config
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.inner.ctx.stats.snapshot()
    }

    /// Number of sensors with a running lane
    pub fn lane_count(&self) -> usize {
        self.inner.lanes.len()
    }

    /// Whether `shutdown` has started
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Ingest a reading and wait until it is stored or absorbed as a duplicate.
    pub async fn ingest(
        &self,
        sensor_id: SensorId,
        value: f64,
        unit: impl Into<String>,
        observed_at: Option<DateTime<Utc>>,
    ) -> Result<IngestOutcome> {
        self.submit(Reading {
            sensor_id,
            value,
            unit: unit.into(),
            observed_at,
        })
        .await?
        .wait()
        .await
    }

    /// Validate a reading and queue it on its sensor's lane.
    ///
    /// Fails fast with `UnknownSensor`, `InvalidValue`, `IllegalArgument` or,
    /// when the lane is full or the pipeline is shutting down, `Overloaded`.
    /// Never waits for queue space.
    pub async fn submit(&self, reading: Reading) -> Result<PendingMeasurement> {
        let ctx = &self.inner.ctx;
        if self.is_closed() {
            return Err(closed_error());
        }
        let sensor = ctx.hierarchy.get_sensor(reading.sensor_id).await?;

        if reading.unit.chars().count() > MAX_UNIT_LEN {
            ctx.stats.record_rejected();
            return Err(SenspireError::IllegalArgument(format!(
                "unit exceeds {} characters",
                MAX_UNIT_LEN
            )));
        }

        if let Some(observed_at) = reading.observed_at {
            let secs = observed_at.timestamp();
            if !(MIN_OBSERVED_AT_SECS..MAX_OBSERVED_AT_SECS).contains(&secs) {
                ctx.stats.record_rejected();
                warn!(sensor_id = %reading.sensor_id, observed_at = %observed_at, "Observation time out of range");
                return Err(SenspireError::IllegalArgument(format!(
                    "observation time {} is outside the accepted range",
                    observed_at
                )));
            }
        }

        let reason = if !reading.value.is_finite() {
            Some("value is not finite".to_string())
        } else {
            // Range is checked in the canonical unit when the unit converts
            let canonical = to_canonical(sensor.sensor_type, reading.value, &reading.unit)
                .unwrap_or(reading.value);
            if ctx.config.ranges.contains(sensor.sensor_type, canonical) {
                None
            } else {
                let range = ctx.config.ranges.range(sensor.sensor_type);
                Some(format!(
                    "outside plausible range [{}, {}] {}",
                    range.start(),
                    range.end(),
                    sensor.sensor_type.expected_unit()
                ))
            }
        };
        if let Some(reason) = reason {
            ctx.stats.record_rejected();
            warn!(sensor_id = %reading.sensor_id, value = reading.value, reason = %reason, "Measurement rejected");
            return Err(SenspireError::InvalidValue {
                value: reading.value,
                sensor_type: sensor.sensor_type,
                reason,
            });
        }

        let (reply, rx) = oneshot::channel();
        let job = Job {
            sensor_id: reading.sensor_id,
            value: reading.value,
            unit: reading.unit,
            timestamp: reading.observed_at.unwrap_or_else(now_utc),
            reply,
        };
        self.enqueue(job).await?;

        Ok(PendingMeasurement {
            sensor_id: reading.sensor_id,
            rx,
        })
    }

    /// Hand a job to its sensor's lane, replacing a lane whose writer died
    async fn enqueue(&self, mut job: Job) -> Result<()> {
        let ctx = &self.inner.ctx;
        let sensor_id = job.sensor_id;

        for _ in 0..2 {
            let sent = {
                let lane = self.inner.lanes.entry(sensor_id);
                // Checked under the shard lock so shutdown sees every lane it must drain
                if self.is_closed() {
                    return Err(closed_error());
                }
                lane.or_insert_with(|| SensorLane::spawn(ctx.clone(), sensor_id))
                    .tx
                    .try_send(job)
            };

            match sent {
                Ok(()) => return Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    ctx.stats.record_overloaded();
                    debug!(sensor_id = %sensor_id, "Ingestion lane full");
                    return Err(SenspireError::Overloaded(format!(
                        "ingestion queue of sensor '{}' is full",
                        sensor_id
                    )));
                }
                Err(mpsc::error::TrySendError::Closed(returned)) => {
                    job = returned;
                    let dead = self
                        .inner
                        .lanes
                        .remove_if(&sensor_id, |_, lane| lane.tx.is_closed());
                    if let Some((_, lane)) = dead {
                        warn!(sensor_id = %sensor_id, "Ingestion lane stopped unexpectedly, restarting");
                        if let Err(e) = lane.handle.await {
                            warn!(sensor_id = %sensor_id, error = %e, "Ingestion lane ended abnormally");
                        }
                    }
                }
            }
        }

        Err(SenspireError::Storage(format!(
            "ingestion lane of sensor '{}' stopped",
            sensor_id
        )))
    }

    /// Stop a sensor's lane after its queued readings are processed
    pub async fn retire_lane(&self, sensor_id: SensorId) {
        let Some((_, lane)) = self.inner.lanes.remove(&sensor_id) else {
            return;
        };
        // Dropping the only sender lets the writer drain and exit
        drop(lane.tx);
        if let Err(e) = lane.handle.await {
            warn!(sensor_id = %sensor_id, error = %e, "Ingestion lane ended abnormally");
        }
    }

    /// Refuse new readings, then drain and stop every lane
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let sensor_ids: Vec<SensorId> = self.inner.lanes.iter().map(|l| *l.key()).collect();
        for sensor_id in &sensor_ids {
            self.retire_lane(*sensor_id).await;
        }
        info!(lanes = sensor_ids.len(), "Ingestion pipeline drained");
    }
}

fn closed_error() -> SenspireError {
    SenspireError::Overloaded("ingestion pipeline is shutting down".to_string())
}

#[async_trait]
impl SensorLifecycleListener for IngestPipeline {
    async fn on_sensors_removed(&self, sensor_ids: &[SensorId]) -> anyhow::Result<()> {
        for sensor_id in sensor_ids {
            self.retire_lane(*sensor_id).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use senspire_common::{CropType, SensorStatus, SensorType, SoilType};
    use senspire_geometry::{AreaMethod, GeometryStore, point, polygon};
    use senspire_hierarchy::{HierarchyConfig, NewFarm, NewPlot, NewSensor};
    use senspire_persistence::{MeasurementPersistence, MemoryPersistService};

    async fn setup(config: IngestConfig) -> (Arc<HierarchyManager>, IngestPipeline, SensorId) {
        let hierarchy = Arc::new(HierarchyManager::new(
            Arc::new(MemoryPersistService::new()),
            GeometryStore::new(AreaMethod::Planar),
            HierarchyConfig::default(),
        ));
        let pipeline = IngestPipeline::new(hierarchy.clone(), config);
        hierarchy.add_listener(Arc::new(pipeline.clone()));

        let farm = hierarchy
            .create_farm(NewFarm {
                owner_id: "owner".to_string(),
                name: "Farm".to_string(),
                location: point!(x: 0.0, y: 0.0),
            })
            .await
            .unwrap();
        let plot = hierarchy
            .create_plot(
                farm.id,
                NewPlot {
                    name: "Plot".to_string(),
                    perimeter: polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)],
                    soil_type: SoilType::Clay,
                    crop_type: CropType::Corn,
                },
            )
            .await
            .unwrap();
        let sensor = hierarchy
            .attach_sensor(
                plot.id,
                NewSensor {
                    sensor_type: SensorType::Temperature,
                    model: "T-1".to_string(),
                    last_calibration: None,
                    status: SensorStatus::Active,
                },
            )
            .await
            .unwrap();
        (hierarchy, pipeline, sensor.id)
    }

    fn at(millis: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_millis_opt(millis).unwrap())
    }

    #[tokio::test]
    async fn test_duplicate_is_absorbed() {
        let (hierarchy, pipeline, sensor) = setup(IngestConfig::default()).await;

        let first = pipeline.ingest(sensor, 21.0, "°C", at(1_000_100)).await.unwrap();
        let second = pipeline.ingest(sensor, 21.0, "°C", at(1_000_900)).await.unwrap();
        assert!(matches!(first, IngestOutcome::Stored(_)));
        assert_eq!(second, IngestOutcome::Duplicate(first.id()));

        // Same bucket, different value is a distinct reading
        let third = pipeline.ingest(sensor, 22.0, "°C", at(1_000_500)).await.unwrap();
        assert!(!third.is_duplicate());

        assert_eq!(hierarchy.store().measurement_count(sensor).await.unwrap(), 2);
        let stats = pipeline.stats();
        assert_eq!(stats.stored, 2);
        assert_eq!(stats.duplicates, 1);
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let (hierarchy, pipeline, sensor) = setup(IngestConfig::default()).await;

        for value in [f64::NAN, f64::INFINITY, 500.0] {
            let err = pipeline.ingest(sensor, value, "°C", at(5_000)).await.unwrap_err();
            assert!(matches!(err, SenspireError::InvalidValue { .. }));
        }
        assert_eq!(hierarchy.store().measurement_count(sensor).await.unwrap(), 0);
        assert_eq!(pipeline.stats().rejected, 3);
    }

    #[tokio::test]
    async fn test_unknown_sensor() {
        let (_, pipeline, _) = setup(IngestConfig::default()).await;
        let err = pipeline
            .ingest(uuid::Uuid::new_v4(), 1.0, "°C", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SenspireError::UnknownSensor(_)));
    }

    #[tokio::test]
    async fn test_unit_mismatch_is_soft() {
        let (hierarchy, pipeline, sensor) = setup(IngestConfig::default()).await;

        // 86 °F is 30 °C, inside the plausible range once converted
        let outcome = pipeline.ingest(sensor, 86.0, "°F", at(9_000)).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Stored(_)));
        assert_eq!(pipeline.stats().unit_mismatches, 1);

        let stored = hierarchy
            .store()
            .measurement_find_range(sensor, Utc.timestamp_millis_opt(0).unwrap(), Utc::now())
            .await
            .unwrap();
        assert_eq!(stored[0].unit, "°F");
        assert_eq!(stored[0].value, 86.0);
    }

    #[tokio::test]
    async fn test_non_active_sensor_flagged() {
        let (hierarchy, pipeline, sensor) = setup(IngestConfig::default()).await;
        hierarchy
            .set_sensor_status(sensor, SensorStatus::Maintenance)
            .await
            .unwrap();

        pipeline.ingest(sensor, 10.0, "°C", at(1_000)).await.unwrap();
        let stored = hierarchy
            .store()
            .measurement_find_range(sensor, Utc.timestamp_millis_opt(0).unwrap(), Utc::now())
            .await
            .unwrap();
        assert!(stored[0].flagged);
        assert_eq!(pipeline.stats().flagged, 1);
    }

    #[tokio::test]
    async fn test_full_lane_is_overloaded() {
        let config = IngestConfig {
            queue_capacity: 1,
            ..IngestConfig::default()
        };
        let (_, pipeline, sensor) = setup(config).await;

        // The lane's writer cannot run before this task yields
        let pending = pipeline
            .submit(Reading {
                sensor_id: sensor,
                value: 1.0,
                unit: "°C".to_string(),
                observed_at: at(1_000),
            })
            .await
            .unwrap();
        let err = pipeline
            .submit(Reading {
                sensor_id: sensor,
                value: 2.0,
                unit: "°C".to_string(),
                observed_at: at(2_000),
            })
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SenspireError::Overloaded(_)));
        assert!(err.is_retryable());

        assert!(matches!(pending.wait().await, Ok(IngestOutcome::Stored(_))));
        assert_eq!(pipeline.stats().overloaded, 1);
    }

    #[tokio::test]
    async fn test_detach_retires_lane() {
        let (hierarchy, pipeline, sensor) = setup(IngestConfig::default()).await;
        pipeline.ingest(sensor, 15.0, "°C", at(1_000)).await.unwrap();
        assert_eq!(pipeline.lane_count(), 1);

        hierarchy.detach_sensor(sensor).await.unwrap();
        assert_eq!(pipeline.lane_count(), 0);
        assert_eq!(hierarchy.store().measurement_count(sensor).await.unwrap(), 0);

        let err = pipeline.ingest(sensor, 15.0, "°C", None).await.unwrap_err();
        assert!(matches!(err, SenspireError::UnknownSensor(_)));
    }

    #[tokio::test]
    async fn test_shutdown_drains() {
        let (hierarchy, pipeline, sensor) = setup(IngestConfig::default()).await;
        let mut pending = Vec::new();
        for i in 0..10 {
            pending.push(
                pipeline
                    .submit(Reading {
                        sensor_id: sensor,
                        value: i as f64,
                        unit: "°C".to_string(),
                        observed_at: at(i * 10_000),
                    })
                    .await
                    .unwrap(),
            );
        }
        pipeline.shutdown().await;
        assert_eq!(pipeline.lane_count(), 0);
        for p in pending {
            assert!(p.wait().await.is_ok());
        }
        assert_eq!(hierarchy.store().measurement_count(sensor).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_refused() {
        let (hierarchy, pipeline, sensor) = setup(IngestConfig::default()).await;
        pipeline.ingest(sensor, 12.0, "°C", at(1_000)).await.unwrap();

        pipeline.shutdown().await;
        assert!(pipeline.is_closed());

        let err = pipeline.ingest(sensor, 13.0, "°C", at(2_000)).await.unwrap_err();
        assert!(matches!(err, SenspireError::Overloaded(_)));
        assert_eq!(pipeline.lane_count(), 0);
        assert_eq!(hierarchy.store().measurement_count(sensor).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dead_lane_is_replaced() {
        let (hierarchy, pipeline, sensor) = setup(IngestConfig::default()).await;
        pipeline.ingest(sensor, 12.0, "°C", at(1_000)).await.unwrap();

        // Kill the writer task behind the lane's back
        let tx = {
            let lane = pipeline.inner.lanes.get(&sensor).unwrap();
            lane.handle.abort();
            lane.tx.clone()
        };
        while !tx.is_closed() {
            tokio::task::yield_now().await;
        }
        drop(tx);

        let outcome = pipeline.ingest(sensor, 14.0, "°C", at(2_000)).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Stored(_)));
        assert_eq!(pipeline.lane_count(), 1);
        assert_eq!(hierarchy.store().measurement_count(sensor).await.unwrap(), 2);
    }
}
