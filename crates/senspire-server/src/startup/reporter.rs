//! Periodic ingestion statistics report

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use senspire_ingest::IngestPipeline;

use super::shutdown::ShutdownSignal;

/// Log ingestion counters every `interval` until shutdown
pub fn spawn_stats_reporter(
    pipeline: IngestPipeline,
    interval: Duration,
    shutdown: &ShutdownSignal,
) -> JoinHandle<()> {
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => report(&pipeline),
                _ = stop.changed() => break,
            }
        }
        report(&pipeline);
    })
}

fn report(pipeline: &IngestPipeline) {
    let stats = pipeline.stats();
    let lanes = pipeline.lane_count();
    metrics::gauge!("senspire_ingest_lanes").set(lanes as f64);
    info!(
        stored = stats.stored,
        duplicates = stats.duplicates,
        rejected = stats.rejected,
        overloaded = stats.overloaded,
        unit_mismatches = stats.unit_mismatches,
        flagged = stats.flagged,
        lanes,
        "Ingestion statistics"
    );
}
