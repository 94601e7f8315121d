//! SQL-based persistence backend (MySQL/PostgreSQL/SQLite via SeaORM)
//!
//! Plot perimeters are stored as WKT text alongside their bounding box
//! columns; the bbox columns carry the spatial prefilter index and the exact
//! predicate runs in the query engine.

pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{prelude::Expr, *};
use uuid::Uuid;

use senspire_common::{FarmId, PlotId, SensorId};
use senspire_geometry::{BBox, Point, parse_polygon_wkt, polygon_to_wkt};

use crate::entity::{farm, measurement, plot, sensor};
use crate::model::{Farm, Measurement, Plot, PlotPage, Sensor, StorageMode};
use crate::traits::{HierarchyPersistence, MeasurementPersistence, PersistenceService};

/// External database persistence service
///
/// Wraps a SeaORM `DatabaseConnection` and implements all persistence traits
/// with direct queries.
pub struct ExternalDbPersistService {
    db: DatabaseConnection,
}

impl ExternalDbPersistService {
    /// Create a new ExternalDbPersistService with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get a reference to the underlying database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

// ============================================================================
// Row conversions
// ============================================================================

fn farm_from_row(row: farm::Model) -> Farm {
    Farm {
        id: row.id,
        owner_id: row.owner_id,
        name: row.name,
        location: Point::new(row.longitude, row.latitude),
        total_area: row.total_area,
        revision: row.revision.max(0) as u64,
        created_at: row.created_at,
    }
}

fn plot_from_row(row: plot::Model) -> anyhow::Result<Plot> {
    let perimeter = parse_polygon_wkt(&row.perimeter)
        .map_err(|e| anyhow::anyhow!("plot '{}' has invalid perimeter: {}", row.id, e))?;
    Ok(Plot {
        id: row.id,
        farm_id: row.farm_id,
        name: row.name,
        perimeter,
        area: row.area,
        bbox: BBox::new(row.min_lat, row.max_lat, row.min_lng, row.max_lng),
        soil_type: row.soil_type.parse().map_err(anyhow::Error::msg)?,
        crop_type: row.crop_type.parse().map_err(anyhow::Error::msg)?,
        created_at: row.created_at,
    })
}

fn plot_to_active(plot: &Plot) -> plot::ActiveModel {
    plot::ActiveModel {
        id: Set(plot.id),
        farm_id: Set(plot.farm_id),
        name: Set(plot.name.clone()),
        perimeter: Set(polygon_to_wkt(&plot.perimeter)),
        area: Set(plot.area),
        min_lat: Set(plot.bbox.min_lat),
        max_lat: Set(plot.bbox.max_lat),
        min_lng: Set(plot.bbox.min_lng),
        max_lng: Set(plot.bbox.max_lng),
        soil_type: Set(plot.soil_type.as_str().to_string()),
        crop_type: Set(plot.crop_type.as_str().to_string()),
        created_at: Set(plot.created_at),
    }
}

fn sensor_from_row(row: sensor::Model) -> anyhow::Result<Sensor> {
    Ok(Sensor {
        id: row.id,
        plot_id: row.plot_id,
        sensor_type: row.sensor_type.parse().map_err(anyhow::Error::msg)?,
        model: row.model,
        last_calibration: row.last_calibration,
        status: row.status.parse().map_err(anyhow::Error::msg)?,
    })
}

fn measurement_from_row(row: measurement::Model) -> Measurement {
    Measurement {
        id: row.id,
        sensor_id: row.sensor_id,
        value: row.value,
        unit: row.unit,
        timestamp: row.timestamp,
        ingested_at: row.ingested_at,
        flagged: row.flagged,
    }
}

// ============================================================================
// PersistenceService implementation
// ============================================================================

#[async_trait]
impl PersistenceService for ExternalDbPersistService {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::ExternalDb
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        // Execute a simple query to verify connectivity
        farm::Entity::find()
            .select_only()
            .column_as(Expr::cust("1"), "health")
            .into_tuple::<i32>()
            .one(&self.db)
            .await?;
        Ok(())
    }
}

// ============================================================================
// HierarchyPersistence implementation
// ============================================================================

#[async_trait]
impl HierarchyPersistence for ExternalDbPersistService {
    async fn farm_insert(&self, farm: &Farm) -> anyhow::Result<()> {
        let entity = farm::ActiveModel {
            id: Set(farm.id),
            owner_id: Set(farm.owner_id.clone()),
            name: Set(farm.name.clone()),
            latitude: Set(farm.location.y()),
            longitude: Set(farm.location.x()),
            total_area: Set(farm.total_area),
            revision: Set(farm.revision as i64),
            created_at: Set(farm.created_at),
        };

        farm::Entity::insert(entity)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn farm_get(&self, farm_id: FarmId) -> anyhow::Result<Option<Farm>> {
        Ok(farm::Entity::find_by_id(farm_id)
            .one(&self.db)
            .await?
            .map(farm_from_row))
    }

    async fn farm_find_by_owner(&self, owner_id: &str) -> anyhow::Result<Vec<Farm>> {
        let rows = farm::Entity::find()
            .filter(farm::Column::OwnerId.eq(owner_id))
            .order_by_asc(farm::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(farm_from_row).collect())
    }

    async fn farm_delete(&self, farm_id: FarmId) -> anyhow::Result<bool> {
        let result = farm::Entity::delete_by_id(farm_id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn farm_bump_revision(&self, farm_id: FarmId) -> anyhow::Result<bool> {
        let result = farm::Entity::update_many()
            .col_expr(
                farm::Column::Revision,
                Expr::col(farm::Column::Revision).add(1),
            )
            .filter(farm::Column::Id.eq(farm_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn farm_update_total_area(
        &self,
        farm_id: FarmId,
        total_area: Option<f64>,
        expected_revision: u64,
    ) -> anyhow::Result<bool> {
        let result = farm::Entity::update_many()
            .col_expr(farm::Column::TotalArea, Expr::value(total_area))
            .filter(farm::Column::Id.eq(farm_id))
            .filter(farm::Column::Revision.eq(expected_revision as i64))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn plot_upsert(&self, plot: &Plot) -> anyhow::Result<()> {
        plot::Entity::insert(plot_to_active(plot))
            .on_conflict(
                OnConflict::column(plot::Column::Id)
                    .update_columns([
                        plot::Column::Name,
                        plot::Column::Perimeter,
                        plot::Column::Area,
                        plot::Column::MinLat,
                        plot::Column::MaxLat,
                        plot::Column::MinLng,
                        plot::Column::MaxLng,
                        plot::Column::SoilType,
                        plot::Column::CropType,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn plot_get(&self, plot_id: PlotId) -> anyhow::Result<Option<Plot>> {
        plot::Entity::find_by_id(plot_id)
            .one(&self.db)
            .await?
            .map(plot_from_row)
            .transpose()
    }

    async fn plot_find_by_farm(&self, farm_id: FarmId) -> anyhow::Result<Vec<Plot>> {
        plot::Entity::find()
            .filter(plot::Column::FarmId.eq(farm_id))
            .order_by_asc(plot::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(plot_from_row)
            .collect()
    }

    async fn plot_delete(&self, plot_id: PlotId) -> anyhow::Result<bool> {
        let result = plot::Entity::delete_by_id(plot_id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn plot_scan_in_bbox(
        &self,
        bbox: &BBox,
        after: Option<PlotId>,
        limit: u64,
    ) -> anyhow::Result<PlotPage> {
        let mut query = plot::Entity::find()
            .filter(plot::Column::MinLat.lte(bbox.max_lat))
            .filter(plot::Column::MaxLat.gte(bbox.min_lat))
            .filter(plot::Column::MinLng.lte(bbox.max_lng))
            .filter(plot::Column::MaxLng.gte(bbox.min_lng));

        if let Some(after) = after {
            query = query.filter(plot::Column::Id.gt(after));
        }

        let rows = query
            .order_by_asc(plot::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        let next = if rows.len() as u64 == limit {
            rows.last().map(|r| r.id)
        } else {
            None
        };
        let plots = rows
            .into_iter()
            .map(plot_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(PlotPage { plots, next })
    }

    async fn sensor_insert(&self, sensor: &Sensor) -> anyhow::Result<()> {
        let entity = sensor::ActiveModel {
            id: Set(sensor.id),
            plot_id: Set(sensor.plot_id),
            sensor_type: Set(sensor.sensor_type.as_str().to_string()),
            model: Set(sensor.model.clone()),
            last_calibration: Set(sensor.last_calibration),
            status: Set(sensor.status.as_str().to_string()),
        };

        sensor::Entity::insert(entity)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn sensor_get(&self, sensor_id: SensorId) -> anyhow::Result<Option<Sensor>> {
        sensor::Entity::find_by_id(sensor_id)
            .one(&self.db)
            .await?
            .map(sensor_from_row)
            .transpose()
    }

    async fn sensor_find_by_plot(&self, plot_id: PlotId) -> anyhow::Result<Vec<Sensor>> {
        sensor::Entity::find()
            .filter(sensor::Column::PlotId.eq(plot_id))
            .order_by_asc(sensor::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(sensor_from_row)
            .collect()
    }

    async fn sensor_update(&self, sensor: &Sensor) -> anyhow::Result<bool> {
        let result = sensor::Entity::update_many()
            .col_expr(
                sensor::Column::Status,
                Expr::value(sensor.status.as_str()),
            )
            .col_expr(sensor::Column::Model, Expr::value(sensor.model.clone()))
            .col_expr(
                sensor::Column::LastCalibration,
                Expr::value(sensor.last_calibration),
            )
            .filter(sensor::Column::Id.eq(sensor.id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn sensor_delete(&self, sensor_id: SensorId) -> anyhow::Result<bool> {
        let result = sensor::Entity::delete_by_id(sensor_id)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

// ============================================================================
// MeasurementPersistence implementation
// ============================================================================

#[async_trait]
impl MeasurementPersistence for ExternalDbPersistService {
    async fn measurement_append(&self, measurement: &Measurement) -> anyhow::Result<()> {
        let entity = measurement::ActiveModel {
            id: Set(measurement.id),
            sensor_id: Set(measurement.sensor_id),
            value: Set(measurement.value),
            unit: Set(measurement.unit.clone()),
            timestamp: Set(measurement.timestamp),
            ingested_at: Set(measurement.ingested_at),
            flagged: Set(measurement.flagged),
        };

        measurement::Entity::insert(entity)
            .exec_without_returning(&self.db)
            .await?;
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
        let rows = measurement::Entity::find()
            .filter(measurement::Column::SensorId.eq(sensor_id))
            .filter(measurement::Column::Timestamp.gte(from))
            .filter(measurement::Column::Timestamp.lt(to))
            .order_by_asc(measurement::Column::Timestamp)
            .order_by_asc(measurement::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(measurement_from_row).collect())
    }

    async fn measurement_count(&self, sensor_id: SensorId) -> anyhow::Result<u64> {
        let count = measurement::Entity::find()
            .filter(measurement::Column::SensorId.eq(sensor_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn measurement_delete_by_sensor(&self, sensor_id: SensorId) -> anyhow::Result<u64> {
        let result = measurement::Entity::delete_many()
            .filter(measurement::Column::SensorId.eq(sensor_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo_types::{point, polygon};
    use senspire_common::{CropType, SensorStatus, SensorType, SoilType};

    async fn setup() -> ExternalDbPersistService {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        schema::create_schema(&db).await.unwrap();
        ExternalDbPersistService::new(db)
    }

    fn farm() -> Farm {
        Farm {
            id: Uuid::new_v4(),
            owner_id: "owner-1".to_string(),
            name: "Sql farm".to_string(),
            location: point!(x: -0.58, y: 44.84),
            total_area: None,
            revision: 0,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn plot(farm_id: FarmId, x: f64) -> Plot {
        let perimeter = polygon![(x: x, y: 44.0), (x: x + 0.01, y: 44.0), (x: x + 0.01, y: 44.01), (x: x, y: 44.01)];
        Plot {
            id: Uuid::new_v4(),
            farm_id,
            name: "Vineyard".to_string(),
            bbox: BBox::from_polygon(&perimeter).unwrap(),
            perimeter,
            area: Some(1000.0),
            soil_type: SoilType::Sandy,
            crop_type: CropType::Soy,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_farm_crud_and_cas() {
        let store = setup().await;
        store.health_check().await.unwrap();
        let f = farm();
        store.farm_insert(&f).await.unwrap();

        let loaded = store.farm_get(f.id).await.unwrap().unwrap();
        assert_eq!(loaded, f);
        assert_eq!(store.farm_find_by_owner("owner-1").await.unwrap().len(), 1);

        assert!(store.farm_bump_revision(f.id).await.unwrap());
        assert!(!store.farm_update_total_area(f.id, Some(5.0), 0).await.unwrap());
        assert!(store.farm_update_total_area(f.id, Some(5.0), 1).await.unwrap());

        let loaded = store.farm_get(f.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_area, Some(5.0));
        assert_eq!(loaded.revision, 1);

        assert!(store.farm_delete(f.id).await.unwrap());
        assert!(store.farm_get(f.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plot_upsert_and_scan() {
        let store = setup().await;
        let f = farm();
        store.farm_insert(&f).await.unwrap();

        let mut p = plot(f.id, 1.0);
        store.plot_upsert(&p).await.unwrap();
        let other = plot(f.id, 30.0);
        store.plot_upsert(&other).await.unwrap();

        p.name = "Renamed".to_string();
        p.area = Some(2000.0);
        store.plot_upsert(&p).await.unwrap();

        let loaded = store.plot_get(p.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(loaded.area, Some(2000.0));
        assert_eq!(loaded.perimeter, p.perimeter);
        assert_eq!(store.plot_find_by_farm(f.id).await.unwrap().len(), 2);

        let region = BBox::new(43.9, 44.1, 0.9, 1.1);
        let hits = store.plot_scan_in_bbox(&region, None, 10).await.unwrap();
        assert_eq!(hits.plots.len(), 1);
        assert_eq!(hits.plots[0].id, p.id);
        assert_eq!(hits.next, None);

        let full = store.plot_scan_in_bbox(&region, None, 1).await.unwrap();
        assert_eq!(full.next, Some(p.id));

        let after = store
            .plot_scan_in_bbox(&region, Some(p.id), 10)
            .await
            .unwrap();
        assert!(after.plots.is_empty());
        assert_eq!(after.next, None);
    }

    #[tokio::test]
    async fn test_sensor_and_measurements() {
        let store = setup().await;
        let f = farm();
        store.farm_insert(&f).await.unwrap();
        let p = plot(f.id, 1.0);
        store.plot_upsert(&p).await.unwrap();

        let mut s = Sensor {
            id: Uuid::new_v4(),
            plot_id: p.id,
            sensor_type: SensorType::Humidity,
            model: "H-9".to_string(),
            last_calibration: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            status: SensorStatus::Active,
        };
        store.sensor_insert(&s).await.unwrap();
        s.status = SensorStatus::Maintenance;
        assert!(store.sensor_update(&s).await.unwrap());
        assert_eq!(
            store.sensor_get(s.id).await.unwrap().unwrap().status,
            SensorStatus::Maintenance
        );

        for (secs, value) in [(1_700_000_030, 30.0), (1_700_000_010, 10.0), (1_700_000_020, 20.0)] {
            let ts = Utc.timestamp_opt(secs, 0).unwrap();
            store
                .measurement_append(&Measurement {
                    id: Uuid::new_v4(),
                    sensor_id: s.id,
                    value,
                    unit: "%".to_string(),
                    timestamp: ts,
                    ingested_at: ts,
                    flagged: false,
                })
                .await
                .unwrap();
        }

        let from = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
        let to = Utc.timestamp_opt(1_700_000_030, 0).unwrap();
        let values: Vec<f64> = store
            .measurement_find_range(s.id, from, to)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.value)
            .collect();
        assert_eq!(values, vec![10.0, 20.0]);

        assert_eq!(store.measurement_count(s.id).await.unwrap(), 3);
        assert_eq!(store.measurement_delete_by_sensor(s.id).await.unwrap(), 3);
        assert!(store.sensor_delete(s.id).await.unwrap());
        assert!(store.sensor_find_by_plot(p.id).await.unwrap().is_empty());
    }
}
