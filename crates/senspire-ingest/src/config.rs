// Ingestion tuning and plausible value ranges

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use senspire_common::{
    DEFAULT_DEDUP_RESOLUTION_MS, DEFAULT_INGEST_QUEUE_CAPACITY, DEFAULT_VALUE_EPSILON,
    SensorType,
};

/// Plausible value range per sensor type, in canonical units
#[derive(Debug, Clone)]
pub struct RangeTable {
    ranges: HashMap<SensorType, RangeInclusive<f64>>,
}

impl Default for RangeTable {
    fn default() -> Self {
        Self {
            ranges: SensorType::ALL
                .iter()
                .map(|t| (*t, t.default_range()))
                .collect(),
        }
    }
}

impl RangeTable {
    /// Override the range of one sensor type
    pub fn with_range(mut self, sensor_type: SensorType, min: f64, max: f64) -> Self {
        self.ranges.insert(sensor_type, min..=max);
        self
    }

    pub fn range(&self, sensor_type: SensorType) -> RangeInclusive<f64> {
        self.ranges
            .get(&sensor_type)
            .cloned()
            .unwrap_or_else(|| sensor_type.default_range())
    }

    pub fn contains(&self, sensor_type: SensorType, value: f64) -> bool {
        self.range(sensor_type).contains(&value)
    }
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Capacity of each per-sensor queue
    pub queue_capacity: usize,
    /// Width of the deduplication time bucket
    pub dedup_resolution: Duration,
    /// Values closer than this are the same reading
    pub value_epsilon: f64,
    /// Flag readings of sensors that are not active
    pub flag_non_active: bool,
    pub ranges: RangeTable,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_INGEST_QUEUE_CAPACITY,
            dedup_resolution: Duration::from_millis(DEFAULT_DEDUP_RESOLUTION_MS),
            value_epsilon: DEFAULT_VALUE_EPSILON,
            flag_non_active: true,
            ranges: RangeTable::default(),
        }
    }
}
