// Hierarchy manager: owns the farm → plot → sensor tree and its derived areas

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use senspire_common::{
    FarmId, PlotId, Result, SenspireError, SensorId, SensorStatus, now_utc,
};
use senspire_geometry::{GeometryStore, Polygon};
use senspire_persistence::{
    Farm, HierarchyPersistence, MeasurementPersistence, PersistenceService, Plot, Sensor,
};

use crate::listener::SensorLifecycleListener;
use crate::lock::FarmLocks;
use crate::model::{
    FarmSnapshot, HierarchyConfig, MAX_MODEL_LEN, MAX_NAME_LEN, NewFarm, NewPlot, NewSensor,
    check_text,
};

/// Hierarchy manager
///
/// All structural writes go through this type. A plot geometry write and the
/// farm total recomputation it triggers complete before the call returns, so
/// the caller always reads its own writes.
pub struct HierarchyManager {
    store: Arc<dyn PersistenceService>,
    geometry: GeometryStore,
    locks: FarmLocks,
    config: HierarchyConfig,
    listeners: parking_lot::RwLock<Vec<Arc<dyn SensorLifecycleListener>>>,
}

impl HierarchyManager {
    pub fn new(
        store: Arc<dyn PersistenceService>,
        geometry: GeometryStore,
        config: HierarchyConfig,
    ) -> Self {
        Self {
            store,
            geometry,
            locks: FarmLocks::new(config.lock_timeout),
            config,
            listeners: parking_lot::RwLock::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn PersistenceService> {
        &self.store
    }

    pub fn geometry(&self) -> &GeometryStore {
        &self.geometry
    }

    /// Register an observer of cascading sensor removal
    pub fn add_listener(&self, listener: Arc<dyn SensorLifecycleListener>) {
        self.listeners.write().push(listener);
    }

    // ========================================================================
    // Farm operations
    // ========================================================================

    pub async fn create_farm(&self, request: NewFarm) -> Result<Farm> {
        check_text("farm name", &request.name, MAX_NAME_LEN)?;
        if request.owner_id.trim().is_empty() {
            return Err(SenspireError::IllegalArgument(
                "owner id must not be blank".to_string(),
            ));
        }
        self.geometry.validate_point(&request.location)?;

        let farm = Farm {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            name: request.name,
            location: request.location,
            total_area: None,
            revision: 0,
            created_at: now_utc(),
        };
        self.store.farm_insert(&farm).await?;

        info!(farm_id = %farm.id, owner_id = %farm.owner_id, "Farm created");
        Ok(farm)
    }

    pub async fn get_farm(&self, farm_id: FarmId) -> Result<Farm> {
        self.store
            .farm_get(farm_id)
            .await?
            .ok_or(SenspireError::UnknownFarm(farm_id))
    }

    pub async fn list_farms_by_owner(&self, owner_id: &str) -> Result<Vec<Farm>> {
        Ok(self.store.farm_find_by_owner(owner_id).await?)
    }

    /// Delete a farm with all of its plots, sensors and measurements
    pub async fn delete_farm(&self, farm_id: FarmId) -> Result<()> {
        let guard = self.locks.write(farm_id).await?;
        self.get_farm(farm_id).await?;

        let plots = self.store.plot_find_by_farm(farm_id).await?;
        for plot in &plots {
            self.cascade_plot(plot).await?;
        }
        self.store.farm_delete(farm_id).await?;

        drop(guard);
        self.locks.forget(farm_id);

        info!(farm_id = %farm_id, plots = plots.len(), "Farm deleted");
        Ok(())
    }

    /// Recompute `Farm.total_area` from the farm's current plot set.
    ///
    /// Optimistic: the sum is committed only if the farm's revision did not
    /// move while plots were read. Conflicts are retried up to
    /// `max_recompute_attempts`, then reported as `Overloaded`.
    pub async fn recompute_farm_total_area(&self, farm_id: FarmId) -> Result<Option<f64>> {
        let attempts = self.config.max_recompute_attempts.max(1);
        for attempt in 1..=attempts {
            match self.try_recompute(farm_id).await {
                Err(SenspireError::ConsistencyRetry(_)) => {
                    counter!("senspire_farm_recompute_conflicts_total").increment(1);
                    debug!(farm_id = %farm_id, attempt, "Farm revision moved during recompute, retrying");
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }

        warn!(farm_id = %farm_id, attempts, "Farm total recompute kept conflicting");
        Err(SenspireError::Overloaded(format!(
            "farm '{}' total area recompute conflicted {} times",
            farm_id, attempts
        )))
    }

    async fn try_recompute(&self, farm_id: FarmId) -> Result<Option<f64>> {
        let farm = self.get_farm(farm_id).await?;
        let plots = self.store.plot_find_by_farm(farm_id).await?;

        // Plots come back in id order, so the float sum is deterministic
        let total = if plots.is_empty() {
            None
        } else {
            let mut sum = 0.0;
            for plot in &plots {
                match plot.area {
                    Some(area) => sum += area,
                    None => {
                        warn!(farm_id = %farm_id, plot_id = %plot.id, "Plot has no computed area, counting it as 0");
                    }
                }
            }
            Some(sum)
        };

        let committed = self
            .store
            .farm_update_total_area(farm_id, total, farm.revision)
            .await?;
        if !committed {
            return Err(SenspireError::ConsistencyRetry(farm_id));
        }

        counter!("senspire_farm_recompute_total").increment(1);
        debug!(farm_id = %farm_id, revision = farm.revision, total_area = ?total, "Farm total area recomputed");
        Ok(total)
    }

    // ========================================================================
    // Plot operations
    // ========================================================================

    pub async fn create_plot(&self, farm_id: FarmId, request: NewPlot) -> Result<Plot> {
        check_text("plot name", &request.name, MAX_NAME_LEN)?;
        let measure = self.geometry.measure(&request.perimeter)?;

        let _guard = self.locks.write(farm_id).await?;
        self.get_farm(farm_id).await?;

        let plot = Plot {
            id: Uuid::new_v4(),
            farm_id,
            name: request.name,
            perimeter: request.perimeter,
            area: Some(measure.area),
            bbox: measure.bbox,
            soil_type: request.soil_type,
            crop_type: request.crop_type,
            created_at: now_utc(),
        };
        self.store.plot_upsert(&plot).await?;
        self.store.farm_bump_revision(farm_id).await?;
        self.recompute_farm_total_area(farm_id).await?;

        info!(farm_id = %farm_id, plot_id = %plot.id, area = measure.area, "Plot created");
        Ok(plot)
    }

    /// Replace a plot's perimeter, recompute its area and the farm total.
    pub async fn set_plot_perimeter(&self, plot_id: PlotId, perimeter: Polygon<f64>) -> Result<Plot> {
        let measure = self.geometry.measure(&perimeter)?;
        let farm_id = self.get_plot(plot_id).await?.farm_id;

        let _guard = self.locks.write(farm_id).await?;
        // Re-read under the lock, the plot may have been deleted meanwhile
        let mut plot = self.get_plot(plot_id).await?;

        plot.perimeter = perimeter;
        plot.area = Some(measure.area);
        plot.bbox = measure.bbox;
        self.store.plot_upsert(&plot).await?;
        self.store.farm_bump_revision(farm_id).await?;
        self.recompute_farm_total_area(farm_id).await?;

        debug!(plot_id = %plot_id, area = measure.area, "Plot perimeter updated");
        Ok(plot)
    }

    /// Delete a plot with its sensors and measurements, then recompute the farm total.
    pub async fn delete_plot(&self, plot_id: PlotId) -> Result<()> {
        let farm_id = self.get_plot(plot_id).await?.farm_id;

        let _guard = self.locks.write(farm_id).await?;
        let plot = self.get_plot(plot_id).await?;

        self.cascade_plot(&plot).await?;
        self.store.farm_bump_revision(farm_id).await?;
        self.recompute_farm_total_area(farm_id).await?;

        info!(farm_id = %farm_id, plot_id = %plot_id, "Plot deleted");
        Ok(())
    }

    pub async fn get_plot(&self, plot_id: PlotId) -> Result<Plot> {
        self.store
            .plot_get(plot_id)
            .await?
            .ok_or(SenspireError::UnknownPlot(plot_id))
    }

    pub async fn list_plots(&self, farm_id: FarmId) -> Result<Vec<Plot>> {
        self.get_farm(farm_id).await?;
        Ok(self.store.plot_find_by_farm(farm_id).await?)
    }

    /// Caller must hold the farm's write lock.
    async fn cascade_plot(&self, plot: &Plot) -> Result<()> {
        let sensor_ids: Vec<SensorId> = self
            .store
            .sensor_find_by_plot(plot.id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        self.remove_sensors(&sensor_ids).await?;
        self.store.plot_delete(plot.id).await?;
        Ok(())
    }

    /// Delete sensor rows, let listeners drain, then purge measurements.
    async fn remove_sensors(&self, sensor_ids: &[SensorId]) -> Result<()> {
        if sensor_ids.is_empty() {
            return Ok(());
        }
        for id in sensor_ids {
            self.store.sensor_delete(*id).await?;
        }

        let listeners: Vec<Arc<dyn SensorLifecycleListener>> = self.listeners.read().clone();
        for listener in listeners {
            if let Err(e) = listener.on_sensors_removed(sensor_ids).await {
                warn!(error = %e, count = sensor_ids.len(), "Sensor removal listener failed");
            }
        }

        let mut purged = 0u64;
        for id in sensor_ids {
            purged += self.store.measurement_delete_by_sensor(*id).await?;
        }
        debug!(sensors = sensor_ids.len(), measurements = purged, "Sensors removed");
        Ok(())
    }

    // ========================================================================
    // Sensor operations
    // ========================================================================

    pub async fn attach_sensor(&self, plot_id: PlotId, request: NewSensor) -> Result<Sensor> {
        check_text("sensor model", &request.model, MAX_MODEL_LEN)?;
        let farm_id = self.get_plot(plot_id).await?.farm_id;

        let _guard = self.locks.write(farm_id).await?;
        self.get_plot(plot_id).await?;

        let sensor = Sensor {
            id: Uuid::new_v4(),
            plot_id,
            sensor_type: request.sensor_type,
            model: request.model,
            last_calibration: request.last_calibration.unwrap_or_else(now_utc),
            status: request.status,
        };
        self.store.sensor_insert(&sensor).await?;

        info!(plot_id = %plot_id, sensor_id = %sensor.id, sensor_type = %sensor.sensor_type, "Sensor attached");
        Ok(sensor)
    }

    /// Remove a sensor and its measurements
    pub async fn detach_sensor(&self, sensor_id: SensorId) -> Result<()> {
        let plot_id = self.get_sensor(sensor_id).await?.plot_id;
        let farm_id = self.get_plot(plot_id).await?.farm_id;

        let _guard = self.locks.write(farm_id).await?;
        self.get_sensor(sensor_id).await?;
        self.remove_sensors(&[sensor_id]).await?;

        info!(sensor_id = %sensor_id, "Sensor detached");
        Ok(())
    }

    pub async fn set_sensor_status(&self, sensor_id: SensorId, status: SensorStatus) -> Result<Sensor> {
        let mut sensor = self.get_sensor(sensor_id).await?;
        sensor.status = status;
        if !self.store.sensor_update(&sensor).await? {
            return Err(SenspireError::UnknownSensor(sensor_id));
        }
        debug!(sensor_id = %sensor_id, status = %status, "Sensor status changed");
        Ok(sensor)
    }

    pub async fn record_calibration(&self, sensor_id: SensorId, at: DateTime<Utc>) -> Result<Sensor> {
        let mut sensor = self.get_sensor(sensor_id).await?;
        sensor.last_calibration = at;
        if !self.store.sensor_update(&sensor).await? {
            return Err(SenspireError::UnknownSensor(sensor_id));
        }
        Ok(sensor)
    }

    pub async fn get_sensor(&self, sensor_id: SensorId) -> Result<Sensor> {
        self.store
            .sensor_get(sensor_id)
            .await?
            .ok_or(SenspireError::UnknownSensor(sensor_id))
    }

    pub async fn list_sensors(&self, plot_id: PlotId) -> Result<Vec<Sensor>> {
        self.get_plot(plot_id).await?;
        Ok(self.store.sensor_find_by_plot(plot_id).await?)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Farm, plots and sensors read together under the farm's read lock
    pub async fn farm_snapshot(&self, farm_id: FarmId) -> Result<FarmSnapshot> {
        let _guard = self.locks.read(farm_id).await?;
        let farm = self.get_farm(farm_id).await?;
        let plots = self.store.plot_find_by_farm(farm_id).await?;

        let mut sensors = Vec::new();
        for plot in &plots {
            sensors.extend(self.store.sensor_find_by_plot(plot.id).await?);
        }

        Ok(FarmSnapshot {
            farm,
            plots,
            sensors,
        })
    }
}
