// Benchmarks for measurement ingestion against the in-memory store

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use senspire_common::{CropType, SensorId, SensorStatus, SensorType, SoilType};
use senspire_geometry::{GeometryStore, point, polygon};
use senspire_hierarchy::{HierarchyConfig, HierarchyManager, NewFarm, NewPlot, NewSensor};
use senspire_ingest::{IngestConfig, IngestPipeline};
use senspire_persistence::MemoryPersistService;

async fn setup() -> (IngestPipeline, SensorId) {
    let hierarchy = Arc::new(HierarchyManager::new(
        Arc::new(MemoryPersistService::new()),
        GeometryStore::default(),
        HierarchyConfig::default(),
    ));
    let farm = hierarchy
        .create_farm(NewFarm {
            owner_id: "bench".to_string(),
            name: "Bench farm".to_string(),
            location: point!(x: -0.58, y: 44.84),
        })
        .await
        .unwrap();
    let plot = hierarchy
        .create_plot(
            farm.id,
            NewPlot {
                name: "Bench plot".to_string(),
                perimeter: polygon![
                    (x: -0.58, y: 44.84),
                    (x: -0.57, y: 44.84),
                    (x: -0.57, y: 44.85),
                    (x: -0.58, y: 44.85),
                ],
                soil_type: SoilType::Loamy,
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
                model: "T-bench".to_string(),
                last_calibration: None,
                status: SensorStatus::Active,
            },
        )
        .await
        .unwrap();
    (IngestPipeline::new(hierarchy, IngestConfig::default()), sensor.id)
}

fn bench_ingest(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (pipeline, sensor) = rt.block_on(setup());
    let clock = AtomicI64::new(0);

    c.bench_function("ingest_distinct", |b| {
        b.to_async(&rt).iter(|| async {
            let millis = clock.fetch_add(1_000, Ordering::Relaxed);
            let at = Utc.timestamp_millis_opt(millis).unwrap();
            black_box(pipeline.ingest(sensor, 20.0, "°C", Some(at)).await)
        })
    });

    c.bench_function("ingest_duplicate", |b| {
        let at = Utc.timestamp_millis_opt(-1_000).unwrap();
        b.to_async(&rt).iter(|| async {
            black_box(pipeline.ingest(sensor, 20.0, "°C", Some(at)).await)
        })
    });
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
