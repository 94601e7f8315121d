// Query result types

use serde::Serialize;

use senspire_common::FarmId;
use senspire_persistence::Measurement;

/// Read-only aggregate of one farm
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmSummary {
    pub farm_id: FarmId,
    /// Sum of plot areas; 0.0 for a farm without plots
    pub total_area: f64,
    pub plot_count: usize,
    pub sensor_count: usize,
    pub active_sensor_count: usize,
}

/// A measurement with its value expressed in the sensor type's canonical unit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReading {
    pub measurement: Measurement,
    pub value: f64,
    pub unit: String,
    /// False when the recorded unit could not be converted
    pub converted: bool,
}
