//! Error types and error codes for Senspire
//!
//! This module defines:
//! - `GeometryError`: invalid input shapes rejected by the geometry store
//! - `SenspireError`: the error taxonomy shared by every component entry point
//! - `ErrorCode`: structured error codes for callers that need stable numbers

use serde::{Deserialize, Serialize};

use crate::types::SensorType;
use crate::{FarmId, PlotId, SensorId};

/// Invalid geometry input. Caller error, never retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("polygon is self-intersecting")]
    SelfIntersecting,

    #[error("polygon is degenerate: {0}")]
    Degenerate(String),

    #[error("polygon has too few vertices: {0} (at least 3 distinct vertices required)")]
    TooFewVertices(usize),

    #[error("coordinate out of bounds: {0}")]
    OutOfBounds(String),

    #[error("malformed geometry text: {0}")]
    Malformed(String),
}

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum SenspireError {
    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("farm '{0}' not exist")]
    UnknownFarm(FarmId),

    #[error("plot '{0}' not exist")]
    UnknownPlot(PlotId),

    #[error("sensor '{0}' not exist")]
    UnknownSensor(SensorId),

    #[error("invalid value {value} for {sensor_type} sensor: {reason}")]
    InvalidValue {
        value: f64,
        sensor_type: SensorType,
        reason: String,
    },

    #[error("duplicate measurement for sensor '{0}'")]
    DuplicateMeasurement(SensorId),

    #[error("overloaded: {0}")]
    Overloaded(String),

    #[error("concurrent modification of farm '{0}', retry")]
    ConsistencyRetry(FarmId),

    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for SenspireError {
    fn from(value: anyhow::Error) -> Self {
        SenspireError::Storage(format!("{:#}", value))
    }
}

impl SenspireError {
    /// Whether the caller should retry the operation with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SenspireError::Overloaded(_)
                | SenspireError::ConsistencyRetry(_)
                | SenspireError::Storage(_)
        )
    }

    /// Whether the error was caused by the caller's input
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            SenspireError::Geometry(_)
                | SenspireError::UnknownFarm(_)
                | SenspireError::UnknownPlot(_)
                | SenspireError::UnknownSensor(_)
                | SenspireError::InvalidValue { .. }
                | SenspireError::IllegalArgument(_)
        )
    }

    /// Structured error code for this error
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            SenspireError::Geometry(GeometryError::SelfIntersecting) => GEOMETRY_SELF_INTERSECTING,
            SenspireError::Geometry(GeometryError::Degenerate(_)) => GEOMETRY_DEGENERATE,
            SenspireError::Geometry(GeometryError::TooFewVertices(_)) => GEOMETRY_TOO_FEW_VERTICES,
            SenspireError::Geometry(GeometryError::OutOfBounds(_)) => GEOMETRY_OUT_OF_BOUNDS,
            SenspireError::Geometry(GeometryError::Malformed(_)) => GEOMETRY_MALFORMED,
            SenspireError::UnknownFarm(_) => FARM_NOT_EXIST,
            SenspireError::UnknownPlot(_) => PLOT_NOT_EXIST,
            SenspireError::UnknownSensor(_) => SENSOR_NOT_EXIST,
            SenspireError::InvalidValue { .. } => MEASUREMENT_INVALID_VALUE,
            SenspireError::DuplicateMeasurement(_) => MEASUREMENT_DUPLICATE,
            SenspireError::Overloaded(_) => OVERLOADED,
            SenspireError::ConsistencyRetry(_) => CONSISTENCY_RETRY,
            SenspireError::IllegalArgument(_) => PARAMETER_VALIDATE_ERROR,
            SenspireError::Storage(_) => DATA_ACCESS_ERROR,
        }
    }
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

// General success and error codes
pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

// Geometry errors
pub const GEOMETRY_SELF_INTERSECTING: ErrorCode<'static> = ErrorCode {
    code: 21000,
    message: "polygon is self-intersecting",
};

pub const GEOMETRY_DEGENERATE: ErrorCode<'static> = ErrorCode {
    code: 21001,
    message: "polygon is degenerate",
};

pub const GEOMETRY_TOO_FEW_VERTICES: ErrorCode<'static> = ErrorCode {
    code: 21002,
    message: "polygon has too few vertices",
};

pub const GEOMETRY_OUT_OF_BOUNDS: ErrorCode<'static> = ErrorCode {
    code: 21003,
    message: "coordinate out of bounds",
};

pub const GEOMETRY_MALFORMED: ErrorCode<'static> = ErrorCode {
    code: 21004,
    message: "malformed geometry text",
};

// Referential errors
pub const FARM_NOT_EXIST: ErrorCode<'static> = ErrorCode {
    code: 22000,
    message: "farm not exist",
};

pub const PLOT_NOT_EXIST: ErrorCode<'static> = ErrorCode {
    code: 22001,
    message: "plot not exist",
};

pub const SENSOR_NOT_EXIST: ErrorCode<'static> = ErrorCode {
    code: 22002,
    message: "sensor not exist",
};

// Ingestion errors
pub const MEASUREMENT_INVALID_VALUE: ErrorCode<'static> = ErrorCode {
    code: 23000,
    message: "measurement value invalid",
};

pub const MEASUREMENT_DUPLICATE: ErrorCode<'static> = ErrorCode {
    code: 23001,
    message: "duplicate measurement",
};

// Transient errors
pub const OVERLOADED: ErrorCode<'static> = ErrorCode {
    code: 50300,
    message: "overloaded, retry with backoff",
};

pub const CONSISTENCY_RETRY: ErrorCode<'static> = ErrorCode {
    code: 50301,
    message: "concurrent modification, retry",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_senspire_error_display() {
        let err = SenspireError::IllegalArgument("empty name".to_string());
        assert_eq!(format!("{}", err), "caused: empty name");

        let err = SenspireError::Geometry(GeometryError::TooFewVertices(2));
        assert_eq!(
            format!("{}", err),
            "invalid geometry: polygon has too few vertices: 2 (at least 3 distinct vertices required)"
        );

        let err = SenspireError::Overloaded("sensor queue full".to_string());
        assert_eq!(format!("{}", err), "overloaded: sensor queue full");
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(SUCCESS.code, 0);
        assert_eq!(
            SenspireError::UnknownSensor(uuid::Uuid::nil()).error_code(),
            SENSOR_NOT_EXIST
        );
        assert_eq!(
            SenspireError::Geometry(GeometryError::SelfIntersecting)
                .error_code()
                .code,
            21000
        );
        assert_eq!(
            SenspireError::ConsistencyRetry(uuid::Uuid::nil()).error_code(),
            CONSISTENCY_RETRY
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SenspireError::Overloaded("busy".into()).is_retryable());
        assert!(SenspireError::ConsistencyRetry(uuid::Uuid::nil()).is_retryable());
        assert!(!SenspireError::UnknownFarm(uuid::Uuid::nil()).is_retryable());
        assert!(SenspireError::Geometry(GeometryError::SelfIntersecting).is_caller_error());
        assert!(!SenspireError::Storage("io".into()).is_caller_error());
    }

    #[test]
    fn test_storage_error_from_anyhow() {
        let err: SenspireError = anyhow::anyhow!("connection refused")
            .context("loading farm")
            .into();
        assert_eq!(
            format!("{}", err),
            "storage error: loading farm: connection refused"
        );
    }
}
