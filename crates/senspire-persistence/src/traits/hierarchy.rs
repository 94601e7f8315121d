//! Farm, plot and sensor persistence trait

use async_trait::async_trait;

use senspire_common::{FarmId, PlotId, SensorId};
use senspire_geometry::BBox;

use crate::model::{Farm, Plot, PlotPage, Sensor};

/// Containment tree persistence operations
#[async_trait]
pub trait HierarchyPersistence: Send + Sync {
    // Farm

    /// Insert a new farm
    async fn farm_insert(&self, farm: &Farm) -> anyhow::Result<()>;

    /// Get a farm by its ID
    async fn farm_get(&self, farm_id: FarmId) -> anyhow::Result<Option<Farm>>;

    /// Find all farms referencing an owner
    async fn farm_find_by_owner(&self, owner_id: &str) -> anyhow::Result<Vec<Farm>>;

    /// Delete a farm row
    async fn farm_delete(&self, farm_id: FarmId) -> anyhow::Result<bool>;

    /// Increment the plot-set revision of a farm
    async fn farm_bump_revision(&self, farm_id: FarmId) -> anyhow::Result<bool>;

    /// Write `total_area` if the farm's revision still equals `expected_revision`.
    ///
    /// Returns `false` when the farm is missing or the revision moved.
    async fn farm_update_total_area(
        &self,
        farm_id: FarmId,
        total_area: Option<f64>,
        expected_revision: u64,
    ) -> anyhow::Result<bool>;

    // Plot

    /// Insert or replace a plot
    async fn plot_upsert(&self, plot: &Plot) -> anyhow::Result<()>;

    /// Get a plot by its ID
    async fn plot_get(&self, plot_id: PlotId) -> anyhow::Result<Option<Plot>>;

    /// All plots of a farm ordered by plot ID
    async fn plot_find_by_farm(&self, farm_id: FarmId) -> anyhow::Result<Vec<Plot>>;

    /// Delete a plot row
    async fn plot_delete(&self, plot_id: PlotId) -> anyhow::Result<bool>;

    /// Keyset page of plots whose bbox intersects `bbox`, ordered by plot ID,
    /// starting strictly after `after`. The page's `next` cursor is `None`
    /// only when no further index entries remain.
    async fn plot_scan_in_bbox(
        &self,
        bbox: &BBox,
        after: Option<PlotId>,
        limit: u64,
    ) -> anyhow::Result<PlotPage>;

    // Sensor

    /// Insert a new sensor
    async fn sensor_insert(&self, sensor: &Sensor) -> anyhow::Result<()>;

    /// Get a sensor by its ID
    async fn sensor_get(&self, sensor_id: SensorId) -> anyhow::Result<Option<Sensor>>;

    /// All sensors of a plot ordered by sensor ID
    async fn sensor_find_by_plot(&self, plot_id: PlotId) -> anyhow::Result<Vec<Sensor>>;

    /// Update mutable sensor fields (status, model, calibration)
    async fn sensor_update(&self, sensor: &Sensor) -> anyhow::Result<bool>;

    /// Delete a sensor row
    async fn sensor_delete(&self, sensor_id: SensorId) -> anyhow::Result<bool>;
}
