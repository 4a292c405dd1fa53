//! Error types for the grading layer.
//!
//! Only loading and lookup helpers return these. The per-tick lifecycle never
//! surfaces a `GradingError` to the driver: threshold lookups are converted to
//! the fail-closed `enabled = false` path by [`crate::threshold`].

use crate::grading_config::ThresholdKind;

/// The primary error type used throughout the grading crate.
#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("threshold '{id}' not found in kpi '{kpi}'")]
    ThresholdNotFound { kpi: String, id: String },

    #[error("threshold '{id}' in kpi '{kpi}' is {found}, expected {expected}")]
    ThresholdKindMismatch {
        kpi: String,
        id: String,
        expected: ThresholdKind,
        found: ThresholdKind,
    },

    #[error("threshold '{id}' has malformed {kind} value '{raw}'")]
    MalformedThreshold {
        id: String,
        kind: ThresholdKind,
        raw: String,
    },

    #[error("kpi '{0}' is not registered")]
    UnknownKpi(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience type alias for `Result<T, GradingError>`.
pub type GradingResult<T> = Result<T, GradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GradingError::ThresholdNotFound {
            kpi: "Collision".into(),
            id: "X".into(),
        };
        assert_eq!(err.to_string(), "threshold 'X' not found in kpi 'Collision'");

        let err = GradingError::ThresholdKindMismatch {
            kpi: "OverSpeed".into(),
            id: "Speed_Tolerance".into(),
            expected: ThresholdKind::Double,
            found: ThresholdKind::Bool,
        };
        assert_eq!(
            err.to_string(),
            "threshold 'Speed_Tolerance' in kpi 'OverSpeed' is bool, expected double"
        );

        let err = GradingError::MalformedThreshold {
            id: "T".into(),
            kind: ThresholdKind::Double,
            raw: "abc".into(),
        };
        assert_eq!(err.to_string(), "threshold 'T' has malformed double value 'abc'");

        let err = GradingError::UnknownKpi("Bar".into());
        assert_eq!(err.to_string(), "kpi 'Bar' is not registered");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: GradingError = io.into();
        assert!(matches!(err, GradingError::Io(_)));
    }
}
