// Per-sensor ingestion lane: a bounded queue drained by a single writer task

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use senspire_common::{Result, SensorId, is_canonical, now_utc, resolution_bucket};
use senspire_hierarchy::HierarchyManager;
use senspire_persistence::{Measurement, MeasurementPersistence};

use crate::config::IngestConfig;
use crate::pipeline::IngestOutcome;
use crate::stats::IngestStats;

/// Shared state of every lane worker
pub(crate) struct LaneContext {
    pub hierarchy: Arc<HierarchyManager>,
    pub config: IngestConfig,
    pub stats: Arc<IngestStats>,
}

/// A validated reading waiting for its lane's writer
pub(crate) struct Job {
    pub sensor_id: SensorId,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub reply: oneshot::Sender<Result<IngestOutcome>>,
}

pub(crate) struct SensorLane {
    pub tx: mpsc::Sender<Job>,
    pub handle: JoinHandle<()>,
}

impl SensorLane {
    pub fn spawn(ctx: Arc<LaneContext>, sensor_id: SensorId) -> Self {
        let (tx, rx) = mpsc::channel(ctx.config.queue_capacity.max(1));
        let handle = tokio::spawn(run(ctx, sensor_id, rx));
        debug!(sensor_id = %sensor_id, "Ingestion lane started");
        Self { tx, handle }
    }
}

/// Drain the lane until every sender is gone
async fn run(ctx: Arc<LaneContext>, sensor_id: SensorId, mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.recv().await {
        let result = store(&ctx, &job).await;
        if let Err(e) = &result {
            warn!(sensor_id = %sensor_id, error = %e, "Measurement not stored");
        }
        // The submitter may have stopped waiting
        let _ = job.reply.send(result);
    }
    debug!(sensor_id = %sensor_id, "Ingestion lane retired");
}

async fn store(ctx: &LaneContext, job: &Job) -> Result<IngestOutcome> {
    // The sensor may have been detached since submission
    let sensor = ctx.hierarchy.get_sensor(job.sensor_id).await?;

    if !is_canonical(sensor.sensor_type, &job.unit) {
        ctx.stats.record_unit_mismatch();
        warn!(
            sensor_id = %job.sensor_id,
            unit = %job.unit,
            expected = sensor.sensor_type.expected_unit(),
            "Measurement unit does not match sensor type"
        );
    }

    let store = ctx.hierarchy.store();
    let (start, end) = resolution_bucket(job.timestamp, ctx.config.dedup_resolution)?;
    let existing = store
        .measurement_find_range(job.sensor_id, start, end)
        .await?;
    if let Some(dup) = existing
        .iter()
        .find(|m| (m.value - job.value).abs() <= ctx.config.value_epsilon)
    {
        ctx.stats.record_duplicate();
        debug!(sensor_id = %job.sensor_id, measurement_id = %dup.id, "Duplicate measurement absorbed");
        return Ok(IngestOutcome::Duplicate(dup.id));
    }

    let flagged = ctx.config.flag_non_active && !sensor.status.is_active();
    let measurement = Measurement {
        id: Uuid::new_v4(),
        sensor_id: job.sensor_id,
        value: job.value,
        unit: job.unit.clone(),
        timestamp: job.timestamp,
        ingested_at: now_utc(),
        flagged,
    };
    store.measurement_append(&measurement).await?;
    ctx.stats.record_stored(flagged);

    Ok(IngestOutcome::Stored(measurement.id))
}
