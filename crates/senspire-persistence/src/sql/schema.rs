//! Table and index creation for the relational backend

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema};

use crate::entity::{farm, measurement, plot, sensor};

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> anyhow::Result<()> {
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .if_not_exists()
            .name("idx_farm_owner")
            .table(farm::Entity)
            .col(farm::Column::OwnerId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_farm_location")
            .table(farm::Entity)
            .col(farm::Column::Latitude)
            .col(farm::Column::Longitude)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_plot_farm")
            .table(plot::Entity)
            .col(plot::Column::FarmId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_plot_bbox")
            .table(plot::Entity)
            .col(plot::Column::MinLat)
            .col(plot::Column::MaxLat)
            .col(plot::Column::MinLng)
            .col(plot::Column::MaxLng)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_sensor_plot")
            .table(sensor::Entity)
            .col(sensor::Column::PlotId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_measurement_sensor_ts")
            .table(measurement::Entity)
            .col(measurement::Column::SensorId)
            .col(measurement::Column::Timestamp)
            .to_owned(),
    ]
}

/// Create the four tables and their indexes if they do not exist yet.
pub async fn create_schema(db: &DatabaseConnection) -> anyhow::Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Parents before children for the foreign keys
    create_table(db, &schema, farm::Entity).await?;
    create_table(db, &schema, plot::Entity).await?;
    create_table(db, &schema, sensor::Entity).await?;
    create_table(db, &schema, measurement::Entity).await?;

    for index in indexes() {
        db.execute(backend.build(&index)).await?;
    }

    tracing::info!(backend = ?backend, "Database schema ready");
    Ok(())
}
