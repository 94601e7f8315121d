//! Unit conversion into each sensor type's canonical unit

use crate::types::SensorType;

/// Convert `value` recorded in `unit` into the canonical unit of `sensor_type`.
///
/// Returns `None` when the unit is unknown for that sensor type.
pub fn to_canonical(sensor_type: SensorType, value: f64, unit: &str) -> Option<f64> {
    let unit = unit.trim();
    match sensor_type {
        SensorType::Temperature => match unit {
            "°C" | "C" | "degC" | "celsius" => Some(value),
            "°F" | "F" | "degF" | "fahrenheit" => Some((value - 32.0) * 5.0 / 9.0),
            "K" | "kelvin" => Some(value - 273.15),
            _ => None,
        },
        SensorType::Humidity => match unit {
            "%" | "percent" => Some(value),
            "fraction" | "ratio" => Some(value * 100.0),
            _ => None,
        },
        SensorType::Ph => match unit {
            "pH" | "ph" => Some(value),
            _ => None,
        },
        SensorType::Light => match unit {
            "lx" | "lux" => Some(value),
            "klx" => Some(value * 1000.0),
            _ => None,
        },
    }
}

/// Whether `unit` is exactly the canonical unit of `sensor_type`
pub fn is_canonical(sensor_type: SensorType, unit: &str) -> bool {
    unit == sensor_type.expected_unit()
}
