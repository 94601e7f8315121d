// Query engine

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use futures::stream::BoxStream;
use tracing::warn;

use senspire_common::{CropType, FarmId, Result, SensorId, to_canonical};
use senspire_geometry::{GeometryStore, Point, Polygon};
use senspire_hierarchy::HierarchyManager;
use senspire_persistence::{Measurement, MeasurementPersistence, PersistenceService, Plot};

use crate::config::QueryConfig;
use crate::model::{FarmSummary, NormalizedReading};
use crate::scan::{RegionPredicate, scan_plots};

/// Read-only queries over the farm hierarchy and measurement series
#[derive(Clone)]
pub struct QueryEngine {
    hierarchy: Arc<HierarchyManager>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(hierarchy: Arc<HierarchyManager>, config: QueryConfig) -> Self {
        Self { hierarchy, config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn store(&self) -> &Arc<dyn PersistenceService> {
        self.hierarchy.store()
    }

    fn geometry(&self) -> GeometryStore {
        *self.hierarchy.geometry()
    }

    fn region_scan(
        &self,
        predicate: RegionPredicate,
        crop_type: Option<CropType>,
    ) -> Result<BoxStream<'static, Result<Plot>>> {
        scan_plots(
            self.store().clone(),
            self.geometry(),
            predicate,
            crop_type,
            self.config.scan_batch_size,
        )
    }

    // ========================================================================
    // Spatial
    // ========================================================================

    /// Plots whose perimeter lies entirely inside `region`, optionally
    /// restricted to one crop. The stream is lazy; dropping it cancels the scan.
    pub fn plots_within_region(
        &self,
        region: Polygon<f64>,
        crop_type: Option<CropType>,
    ) -> Result<BoxStream<'static, Result<Plot>>> {
        self.geometry().validate_polygon(&region)?;
        self.region_scan(RegionPredicate::Within(region), crop_type)
    }

    /// Plots whose perimeter touches or overlaps `region`
    pub fn plots_intersecting_region(
        &self,
        region: Polygon<f64>,
        crop_type: Option<CropType>,
    ) -> Result<BoxStream<'static, Result<Plot>>> {
        self.geometry().validate_polygon(&region)?;
        self.region_scan(RegionPredicate::Intersecting(region), crop_type)
    }

    /// Plots containing `point`, boundary inclusive
    pub async fn plots_at_point(&self, point: Point<f64>) -> Result<Vec<Plot>> {
        self.geometry().validate_point(&point)?;
        self.region_scan(RegionPredicate::Covering(point), None)?
            .try_collect()
            .await
    }

    // ========================================================================
    // Time series
    // ========================================================================

    /// Measurements of a sensor in `[from, to)`, ascending by timestamp
    pub async fn readings_in_window(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Measurement>> {
        self.hierarchy.get_sensor(sensor_id).await?;
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(self.store().measurement_find_range(sensor_id, from, to).await?)
    }

    /// Like [`readings_in_window`](Self::readings_in_window), with values
    /// converted into the sensor type's canonical unit where possible.
    pub async fn readings_in_window_normalized(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NormalizedReading>> {
        let sensor = self.hierarchy.get_sensor(sensor_id).await?;
        let canonical_unit = sensor.sensor_type.expected_unit();
        let readings = self.readings_in_window(sensor_id, from, to).await?;

        Ok(readings
            .into_iter()
            .map(|m| match to_canonical(sensor.sensor_type, m.value, &m.unit) {
                Some(value) => NormalizedReading {
                    value,
                    unit: canonical_unit.to_string(),
                    converted: true,
                    measurement: m,
                },
                None => {
                    warn!(
                        sensor_id = %sensor_id,
                        measurement_id = %m.id,
                        unit = %m.unit,
                        "Measurement unit cannot be converted"
                    );
                    NormalizedReading {
                        value: m.value,
                        unit: m.unit.clone(),
                        converted: false,
                        measurement: m,
                    }
                }
            })
            .collect())
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    pub async fn farm_summary(&self, farm_id: FarmId) -> Result<FarmSummary> {
        let snapshot = self.hierarchy.farm_snapshot(farm_id).await?;
        Ok(FarmSummary {
            farm_id,
            total_area: snapshot.farm.total_area.unwrap_or(0.0),
            plot_count: snapshot.plots.len(),
            sensor_count: snapshot.sensors.len(),
            active_sensor_count: snapshot.active_sensor_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use futures::StreamExt;
    use senspire_common::{SenspireError, SensorStatus, SensorType, SoilType};
    use senspire_geometry::{AreaMethod, point, polygon};
    use senspire_hierarchy::{HierarchyConfig, NewFarm, NewPlot, NewSensor};
    use senspire_persistence::MemoryPersistService;
    use uuid::Uuid;

    fn square(x: f64, y: f64, side: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + side, y: y),
            (x: x + side, y: y + side),
            (x: x, y: y + side),
        ]
    }

    fn hierarchy() -> Arc<HierarchyManager> {
        Arc::new(HierarchyManager::new(
            Arc::new(MemoryPersistService::new()),
            GeometryStore::new(AreaMethod::Planar),
            HierarchyConfig::default(),
        ))
    }

    async fn farm(h: &HierarchyManager) -> FarmId {
        h.create_farm(NewFarm {
            owner_id: "owner".to_string(),
            name: "Farm".to_string(),
            location: point!(x: 0.0, y: 0.0),
        })
        .await
        .unwrap()
        .id
    }

    async fn plot(h: &HierarchyManager, farm_id: FarmId, perimeter: Polygon<f64>, crop: CropType) -> Plot {
        h.create_plot(
            farm_id,
            NewPlot {
                name: "Plot".to_string(),
                perimeter,
                soil_type: SoilType::Loamy,
                crop_type: crop,
            },
        )
        .await
        .unwrap()
    }

    async fn ids(stream: BoxStream<'static, Result<Plot>>) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = stream.map(|p| p.unwrap().id).collect().await;
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_plots_within_region() {
        let h = hierarchy();
        let f = farm(&h).await;
        let inside = plot(&h, f, square(1.0, 1.0, 2.0), CropType::Corn).await;
        let crossing = plot(&h, f, square(9.0, 9.0, 2.0), CropType::Corn).await;
        plot(&h, f, square(20.0, 20.0, 2.0), CropType::Corn).await;
        let wheat = plot(&h, f, square(4.0, 4.0, 1.0), CropType::Wheat).await;

        // Small pages force several round trips
        let engine = QueryEngine::new(h.clone(), QueryConfig { scan_batch_size: 1 });
        let region = square(0.0, 0.0, 10.0);

        let mut expected = vec![inside.id, wheat.id];
        expected.sort();
        assert_eq!(ids(engine.plots_within_region(region.clone(), None).unwrap()).await, expected);
        assert_eq!(
            ids(engine.plots_within_region(region.clone(), Some(CropType::Wheat)).unwrap()).await,
            vec![wheat.id]
        );

        let mut expected = vec![inside.id, crossing.id, wheat.id];
        expected.sort();
        assert_eq!(ids(engine.plots_intersecting_region(region, None).unwrap()).await, expected);
    }

    #[tokio::test]
    async fn test_region_must_be_valid() {
        let engine = QueryEngine::new(hierarchy(), QueryConfig::default());
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0)];
        let err = engine.plots_within_region(bowtie, None).err().unwrap();
        assert!(matches!(err, SenspireError::Geometry(_)));
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_scan() {
        let h = hierarchy();
        let f = farm(&h).await;
        for i in 0..10 {
            plot(&h, f, square(i as f64, 0.0, 0.5), CropType::Soy).await;
        }
        let engine = QueryEngine::new(h, QueryConfig { scan_batch_size: 2 });
        let mut stream = engine
            .plots_within_region(square(-1.0, -1.0, 20.0), None)
            .unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.crop_type, CropType::Soy);
        drop(stream);
    }

    #[tokio::test]
    async fn test_plots_at_point_boundary_inclusive() {
        let h = hierarchy();
        let f = farm(&h).await;
        let a = plot(&h, f, square(0.0, 0.0, 2.0), CropType::Corn).await;
        let b = plot(&h, f, square(2.0, 0.0, 2.0), CropType::Corn).await;

        let engine = QueryEngine::new(h, QueryConfig::default());
        let mut found: Vec<Uuid> = engine
            .plots_at_point(point!(x: 2.0, y: 1.0))
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        found.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(found, expected);

        assert!(engine.plots_at_point(point!(x: 5.0, y: 5.0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_readings_in_window() {
        let h = hierarchy();
        let f = farm(&h).await;
        let p = plot(&h, f, square(0.0, 0.0, 1.0), CropType::Corn).await;
        let sensor = h
            .attach_sensor(
                p.id,
                NewSensor {
                    sensor_type: SensorType::Temperature,
                    model: "T".to_string(),
                    last_calibration: None,
                    status: SensorStatus::Active,
                },
            )
            .await
            .unwrap();

        let ts = |s: i64| Utc.timestamp_opt(s, 0).unwrap();
        for (s, value, unit) in [(30, 68.0, "°F"), (10, 20.0, "°C"), (20, 5.0, "widgets")] {
            h.store()
                .measurement_append(&Measurement {
                    id: Uuid::new_v4(),
                    sensor_id: sensor.id,
                    value,
                    unit: unit.to_string(),
                    timestamp: ts(s),
                    ingested_at: Utc::now(),
                    flagged: false,
                })
                .await
                .unwrap();
        }

        let engine = QueryEngine::new(h.clone(), QueryConfig::default());
        let window = engine.readings_in_window(sensor.id, ts(10), ts(30)).await.unwrap();
        assert_eq!(window.iter().map(|m| m.value).collect::<Vec<_>>(), vec![20.0, 5.0]);

        assert!(engine.readings_in_window(sensor.id, ts(30), ts(10)).await.unwrap().is_empty());
        assert!(engine.readings_in_window(sensor.id, ts(100), ts(200)).await.unwrap().is_empty());

        let err = engine
            .readings_in_window(Uuid::new_v4(), ts(0), ts(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SenspireError::UnknownSensor(_)));

        let normalized = engine
            .readings_in_window_normalized(sensor.id, ts(0), ts(100))
            .await
            .unwrap();
        assert_eq!(normalized.len(), 3);
        assert!(normalized[0].converted);
        assert_eq!(normalized[0].unit, "°C");
        assert!(!normalized[1].converted);
        assert_eq!(normalized[1].unit, "widgets");
        assert!(normalized[2].converted);
        assert!((normalized[2].value - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_farm_summary() {
        let h = hierarchy();
        let f = farm(&h).await;
        let engine = QueryEngine::new(h.clone(), QueryConfig::default());

        let empty = engine.farm_summary(f).await.unwrap();
        assert_eq!(empty.total_area, 0.0);
        assert_eq!(empty.plot_count, 0);

        let p = plot(&h, f, square(0.0, 0.0, 10.0), CropType::Corn).await;
        plot(&h, f, square(20.0, 0.0, 5.0), CropType::Wheat).await;
        for status in [SensorStatus::Active, SensorStatus::Inactive, SensorStatus::Active] {
            h.attach_sensor(
                p.id,
                NewSensor {
                    sensor_type: SensorType::Light,
                    model: "L".to_string(),
                    last_calibration: None,
                    status,
                },
            )
            .await
            .unwrap();
        }

        let summary = engine.farm_summary(f).await.unwrap();
        assert_eq!(
            summary,
            FarmSummary {
                farm_id: f,
                total_area: 125.0,
                plot_count: 2,
                sensor_count: 3,
                active_sensor_count: 2,
            }
        );

        let err = engine.farm_summary(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SenspireError::UnknownFarm(_)));
    }
}
