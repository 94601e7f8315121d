// In-memory persistence backend
// Provides standalone storage without an external database

mod grid;

pub use grid::{CellKey, DEFAULT_CELL_DEGREES, GridIndex, MAX_CELLS_PER_PLOT};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use senspire_common::{FarmId, MeasurementId, PlotId, SensorId};
use senspire_geometry::BBox;

use crate::model::{Farm, Measurement, Plot, PlotPage, Sensor, StorageMode};
use crate::traits::{HierarchyPersistence, MeasurementPersistence, PersistenceService};

type SeriesKey = (DateTime<Utc>, MeasurementId);
type Series = Arc<RwLock<BTreeMap<SeriesKey, Measurement>>>;

/// Standalone in-memory persistence
///
/// Rows live in `DashMap`s keyed by ID. Ownership indexes map each farm to its
/// plots and each plot to its sensors. Plot bounding boxes are bucketed in a
/// [`GridIndex`] whose scans return plot IDs in order, so spatial scans page
/// with a stable cursor. Each sensor's measurements form an independent
/// ordered series, so appends for different sensors never contend.
#[derive(Default)]
pub struct MemoryPersistService {
    farms: DashMap<FarmId, Farm>,
    plots: DashMap<PlotId, Plot>,
    sensors: DashMap<SensorId, Sensor>,
    farm_plots: DashMap<FarmId, Vec<PlotId>>,
    plot_sensors: DashMap<PlotId, Vec<SensorId>>,
    grid: RwLock<GridIndex>,
    series: DashMap<SensorId, Series>,
}

impl MemoryPersistService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose spatial grid uses cells of `cell_degrees`
    pub fn with_cell_size(cell_degrees: f64) -> Self {
        Self {
            grid: RwLock::new(GridIndex::new(cell_degrees)),
            ..Self::default()
        }
    }

    fn series_for(&self, sensor_id: SensorId) -> Option<Series> {
        self.series.get(&sensor_id).map(|s| s.value().clone())
    }
}

fn unlink<K: std::hash::Hash + Eq>(index: &DashMap<K, Vec<Uuid>>, owner: &K, child: Uuid) {
    if let Some(mut children) = index.get_mut(owner) {
        children.retain(|id| *id != child);
    }
}

// ============================================================================
// PersistenceService implementation
// ============================================================================

#[async_trait]
impl PersistenceService for MemoryPersistService {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Memory
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ============================================================================
// HierarchyPersistence implementation
// ============================================================================

#[async_trait]
impl HierarchyPersistence for MemoryPersistService {
    async fn farm_insert(&self, farm: &Farm) -> anyhow::Result<()> {
        if self.farms.contains_key(&farm.id) {
            anyhow::bail!("farm '{}' already exists", farm.id);
        }
        self.farms.insert(farm.id, farm.clone());
        self.farm_plots.entry(farm.id).or_default();
        Ok(())
    }

    async fn farm_get(&self, farm_id: FarmId) -> anyhow::Result<Option<Farm>> {
        Ok(self.farms.get(&farm_id).map(|f| f.value().clone()))
    }

    async fn farm_find_by_owner(&self, owner_id: &str) -> anyhow::Result<Vec<Farm>> {
        let mut farms: Vec<Farm> = self
            .farms
            .iter()
            .filter(|f| f.owner_id == owner_id)
            .map(|f| f.value().clone())
            .collect();
        farms.sort_by_key(|f| f.id);
        Ok(farms)
    }

    async fn farm_delete(&self, farm_id: FarmId) -> anyhow::Result<bool> {
        self.farm_plots.remove(&farm_id);
        Ok(self.farms.remove(&farm_id).is_some())
    }

    async fn farm_bump_revision(&self, farm_id: FarmId) -> anyhow::Result<bool> {
        match self.farms.get_mut(&farm_id) {
            Some(mut farm) => {
                farm.revision += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn farm_update_total_area(
        &self,
        farm_id: FarmId,
        total_area: Option<f64>,
        expected_revision: u64,
    ) -> anyhow::Result<bool> {
        match self.farms.get_mut(&farm_id) {
            Some(mut farm) if farm.revision == expected_revision => {
                farm.total_area = total_area;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn plot_upsert(&self, plot: &Plot) -> anyhow::Result<()> {
        if !self.farms.contains_key(&plot.farm_id) {
            anyhow::bail!("farm '{}' does not exist", plot.farm_id);
        }
        let previous = self.plots.insert(plot.id, plot.clone());
        if previous.is_none() {
            self.farm_plots.entry(plot.farm_id).or_default().push(plot.id);
            self.plot_sensors.entry(plot.id).or_default();
        }
        self.grid.write().insert(plot.id, plot.bbox);
        Ok(())
    }

    async fn plot_get(&self, plot_id: PlotId) -> anyhow::Result<Option<Plot>> {
        Ok(self.plots.get(&plot_id).map(|p| p.value().clone()))
    }

    async fn plot_find_by_farm(&self, farm_id: FarmId) -> anyhow::Result<Vec<Plot>> {
        let ids = self
            .farm_plots
            .get(&farm_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        let mut plots: Vec<Plot> = ids
            .iter()
            .filter_map(|id| self.plots.get(id).map(|p| p.value().clone()))
            .collect();
        plots.sort_by_key(|p| p.id);
        Ok(plots)
    }

    async fn plot_delete(&self, plot_id: PlotId) -> anyhow::Result<bool> {
        let Some((_, plot)) = self.plots.remove(&plot_id) else {
            return Ok(false);
        };
        unlink(&self.farm_plots, &plot.farm_id, plot_id);
        self.plot_sensors.remove(&plot_id);
        self.grid.write().remove(plot_id);
        Ok(true)
    }

    async fn plot_scan_in_bbox(
        &self,
        bbox: &BBox,
        after: Option<PlotId>,
        limit: u64,
    ) -> anyhow::Result<PlotPage> {
        let ids = self.grid.read().scan(bbox, after, limit as usize);
        let next = if ids.len() as u64 == limit {
            ids.last().copied()
        } else {
            None
        };
        // Rows deleted since the index walk are skipped, the cursor still advances
        let plots = ids
            .iter()
            .filter_map(|id| self.plots.get(id).map(|p| p.value().clone()))
            .collect();
        Ok(PlotPage { plots, next })
    }

    async fn sensor_insert(&self, sensor: &Sensor) -> anyhow::Result<()> {
        if !self.plots.contains_key(&sensor.plot_id) {
            anyhow::bail!("plot '{}' does not exist", sensor.plot_id);
        }
        if self.sensors.contains_key(&sensor.id) {
            anyhow::bail!("sensor '{}' already exists", sensor.id);
        }
        self.sensors.insert(sensor.id, sensor.clone());
        self.plot_sensors
            .entry(sensor.plot_id)
            .or_default()
            .push(sensor.id);
        Ok(())
    }

    async fn sensor_get(&self, sensor_id: SensorId) -> anyhow::Result<Option<Sensor>> {
        Ok(self.sensors.get(&sensor_id).map(|s| s.value().clone()))
    }

    async fn sensor_find_by_plot(&self, plot_id: PlotId) -> anyhow::Result<Vec<Sensor>> {
        let ids = self
            .plot_sensors
            .get(&plot_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        let mut sensors: Vec<Sensor> = ids
            .iter()
            .filter_map(|id| self.sensors.get(id).map(|s| s.value().clone()))
            .collect();
        sensors.sort_by_key(|s| s.id);
        Ok(sensors)
    }

    async fn sensor_update(&self, sensor: &Sensor) -> anyhow::Result<bool> {
        match self.sensors.get_mut(&sensor.id) {
            Some(mut existing) => {
                existing.status = sensor.status;
                existing.model = sensor.model.clone();
                existing.last_calibration = sensor.last_calibration;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn sensor_delete(&self, sensor_id: SensorId) -> anyhow::Result<bool> {
        let Some((_, sensor)) = self.sensors.remove(&sensor_id) else {
            return Ok(false);
        };
        unlink(&self.plot_sensors, &sensor.plot_id, sensor_id);
        Ok(true)
    }
}

// ============================================================================
// MeasurementPersistence implementation
// ============================================================================

#[async_trait]
impl MeasurementPersistence for MemoryPersistService {
    async fn measurement_append(&self, measurement: &Measurement) -> anyhow::Result<()> {
        let series = self
            .series
            .entry(measurement.sensor_id)
            .or_default()
            .value()
            .clone();
        series
            .write()
            .insert((measurement.timestamp, measurement.id), measurement.clone());
        Ok(())
    }

    async fn measurement_find_range(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Measurement>> {
        if from >= to {
            return Ok(Vec::new());
        }
        let Some(series) = self.series_for(sensor_id) else {
            return Ok(Vec::new());
        };
        let series = series.read();
        // Nil is the smallest UUID, so these bounds are [from, to) on timestamps
        Ok(series
            .range((from, Uuid::nil())..(to, Uuid::nil()))
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn measurement_count(&self, sensor_id: SensorId) -> anyhow::Result<u64> {
        Ok(self
            .series_for(sensor_id)
            .map(|s| s.read().len() as u64)
            .unwrap_or(0))
    }

    async fn measurement_delete_by_sensor(&self, sensor_id: SensorId) -> anyhow::Result<u64> {
        Ok(self
            .series
            .remove(&sensor_id)
            .map(|(_, s)| s.read().len() as u64)
            .unwrap_or(0))
    }
}
