//! Senspire Hierarchy - Farm → Plot → Sensor containment tree
//!
//! The [`HierarchyManager`] is the only writer of farms, plots and sensors. It
//! keeps `Plot.area` equal to the area of the plot's current perimeter and
//! `Farm.total_area` equal to the sum of the farm's plot areas.
//!
//! Structural mutations of one farm (plot create/edit/delete, sensor
//! attach/detach) serialize on that farm's lock; different farms proceed in
//! parallel. Farm totals are recomputed from the full current plot set with an
//! optimistic compare-and-set on the farm's revision, so replaying a
//! recomputation is idempotent and concurrent edits converge.

pub mod listener;
pub mod lock;
pub mod model;
pub mod service;

pub use listener::SensorLifecycleListener;
pub use lock::FarmLocks;
pub use model::{FarmSnapshot, HierarchyConfig, NewFarm, NewPlot, NewSensor};
pub use service::HierarchyManager;
