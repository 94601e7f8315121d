//! Closed enums for the farm data model
//!
//! Choice fields are closed tagged variants: unknown strings are rejected at
//! parse time instead of being stored and discovered later.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Soil classification of a plot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoilType {
    Clay,
    Sandy,
    Loamy,
}

impl SoilType {
    pub const ALL: [SoilType; 3] = [SoilType::Clay, SoilType::Sandy, SoilType::Loamy];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoilType::Clay => "clay",
            SoilType::Sandy => "sandy",
            SoilType::Loamy => "loamy",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SoilType::Clay => "Clay",
            SoilType::Sandy => "Sandy",
            SoilType::Loamy => "Loamy",
        }
    }
}

impl std::fmt::Display for SoilType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SoilType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clay" => Ok(SoilType::Clay),
            "sandy" => Ok(SoilType::Sandy),
            "loamy" => Ok(SoilType::Loamy),
            _ => Err(format!("Invalid soil type: {}", s)),
        }
    }
}

/// Crop planted on a plot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropType {
    Corn,
    Wheat,
    Soy,
}

impl CropType {
    pub const ALL: [CropType; 3] = [CropType::Corn, CropType::Wheat, CropType::Soy];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropType::Corn => "corn",
            CropType::Wheat => "wheat",
            CropType::Soy => "soy",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CropType::Corn => "Corn",
            CropType::Wheat => "Wheat",
            CropType::Soy => "Soy",
        }
    }
}

impl std::fmt::Display for CropType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CropType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "corn" => Ok(CropType::Corn),
            "wheat" => Ok(CropType::Wheat),
            "soy" => Ok(CropType::Soy),
            _ => Err(format!("Invalid crop type: {}", s)),
        }
    }
}

/// Physical quantity measured by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Temperature,
    Humidity,
    Ph,
    Light,
}

impl SensorType {
    pub const ALL: [SensorType; 4] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Ph,
        SensorType::Light,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Ph => "ph",
            SensorType::Light => "light",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SensorType::Temperature => "Temperature",
            SensorType::Humidity => "Soil humidity",
            SensorType::Ph => "pH",
            SensorType::Light => "Luminosity",
        }
    }

    /// Canonical unit readings of this type are stored in
    pub fn expected_unit(&self) -> &'static str {
        match self {
            SensorType::Temperature => "°C",
            SensorType::Humidity => "%",
            SensorType::Ph => "pH",
            SensorType::Light => "lx",
        }
    }

    /// Physically plausible value range in the canonical unit
    pub fn default_range(&self) -> RangeInclusive<f64> {
        match self {
            SensorType::Temperature => -60.0..=70.0,
            SensorType::Humidity => 0.0..=100.0,
            SensorType::Ph => 0.0..=14.0,
            SensorType::Light => 0.0..=200_000.0,
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SensorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(SensorType::Temperature),
            "humidity" => Ok(SensorType::Humidity),
            "ph" => Ok(SensorType::Ph),
            "light" => Ok(SensorType::Light),
            _ => Err(format!("Invalid sensor type: {}", s)),
        }
    }
}

/// Operational status of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

impl SensorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Active => "active",
            SensorStatus::Inactive => "inactive",
            SensorStatus::Maintenance => "maintenance",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SensorStatus::Active => "Active",
            SensorStatus::Inactive => "Inactive",
            SensorStatus::Maintenance => "Maintenance",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SensorStatus::Active)
    }
}

impl std::fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SensorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SensorStatus::Active),
            "inactive" => Ok(SensorStatus::Inactive),
            "maintenance" => Ok(SensorStatus::Maintenance),
            _ => Err(format!("Invalid sensor status: {}", s)),
        }
    }
}
