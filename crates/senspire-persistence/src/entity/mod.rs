//! `SeaORM` entities for the relational backend

pub mod prelude;

pub mod farm;
pub mod measurement;
pub mod plot;
pub mod sensor;
