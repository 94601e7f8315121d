//! `SeaORM` entity prelude

pub use super::farm::Entity as Farm;
pub use super::measurement::Entity as Measurement;
pub use super::plot::Entity as Plot;
pub use super::sensor::Entity as Sensor;
