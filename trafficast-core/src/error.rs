//! Error types for the trafficast-core crate.
//!
//! Each pipeline stage owns a `thiserror` enum; [`TrafficError`] wraps them at
//! the request boundary. Startup failures (`SchemaBuild`, `Config`, `Data`)
//! are fatal, per-request failures (`Normalization`, `SchemaMismatch`,
//! `Prediction`) reject only the request that raised them.

use thiserror::Error;

/// Top-level error type for trafficast operations.
#[derive(Debug, Error)]
pub enum TrafficError {
    #[error("Schema build error: {0}")]
    SchemaBuild(#[from] SchemaBuildError),

    #[error("Normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(#[from] SchemaMismatchError),

    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

impl TrafficError {
    /// Whether the error only affects the request that raised it.
    pub fn is_per_request(&self) -> bool {
        matches!(
            self,
            Self::Normalization(_) | Self::SchemaMismatch(_) | Self::Prediction(_)
        )
    }
}

/// Errors raised while deriving the schema reference from the reference dataset.
#[derive(Debug, Error)]
pub enum SchemaBuildError {
    #[error("Reference dataset is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Reference dataset contains no rows")]
    EmptyDataset,

    #[error("Reference row {row} is invalid: {source}")]
    InvalidRow {
        row: usize,
        #[source]
        source: NormalizationError,
    },
}

/// Errors raised while turning a raw record into a normalized record.
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("Missing required field '{field}'")]
    MissingField { field: String },

    #[error("Field '{field}' has invalid value '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Field '{field}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Field '{field}' is '{given}' but timestamp implies '{derived}'")]
    InconsistentTimestamp {
        field: String,
        given: String,
        derived: String,
    },

    #[error("Unknown {field} category '{value}'")]
    UnknownCategory { field: String, value: String },

    #[error("Batch row {row}: {source}")]
    BatchRow {
        row: usize,
        #[source]
        source: Box<NormalizationError>,
    },

    #[error("Batch contains no records")]
    EmptyBatch,
}

impl NormalizationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Attach the batch row index to an error raised while normalizing that row.
    pub fn at_row(self, row: usize) -> Self {
        Self::BatchRow {
            row,
            source: Box::new(self),
        }
    }
}

/// The encoded column layout disagrees with what the predictor expects.
///
/// Signals version skew between the reference dataset and the predictor artifact.
#[derive(Debug, Error)]
pub enum SchemaMismatchError {
    #[error("Encoded width {actual} does not match predictor width {expected}")]
    Width { expected: usize, actual: usize },

    #[error("Predictor publishes {names} feature names for width {width}")]
    FeatureNameCount { width: usize, names: usize },

    #[error("Encoded column {index} is '{actual}' but predictor expects '{expected}'")]
    Column {
        index: usize,
        expected: String,
        actual: String,
    },
}

/// Errors from invoking the frozen predictor.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Alpha must lie strictly between 0 and 1, got {alpha}")]
    InvalidAlpha { alpha: f64 },

    #[error("Matrix width {actual} does not match predictor width {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("Predictor returned {actual} {what} for {expected} rows")]
    OutputLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Alpha {alpha} needs more than {scores} calibration scores for its coverage guarantee"
    )]
    InsufficientCalibration { alpha: f64, scores: usize },

    #[error("Predictor returned a non-finite value for row {row}")]
    NonFinite { row: usize },

    #[error("Predictor '{name}' failed: {message}")]
    Backend { name: String, message: String },

    #[error("Failed to load predictor artifact: {0}")]
    Artifact(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Alpha {alpha} is outside the configured range [{min}, {max}]")]
    AlphaOutOfRange { alpha: f64, min: f64, max: f64 },

    #[error("Alpha {alpha} is not a multiple of {step} from {min}")]
    AlphaOffStep { alpha: f64, step: f64, min: f64 },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors reading or writing tabular data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Malformed row {row}: {message}")]
    MalformedRow { row: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_request_classification() {
        let err: TrafficError = NormalizationError::missing("temp").into();
        assert!(err.is_per_request());

        let err: TrafficError = SchemaMismatchError::Width {
            expected: 10,
            actual: 9,
        }
        .into();
        assert!(err.is_per_request());

        let err: TrafficError = SchemaBuildError::EmptyDataset.into();
        assert!(!err.is_per_request());
    }

    #[test]
    fn test_batch_row_message() {
        let err = NormalizationError::missing("weather_main").at_row(3);
        assert_eq!(
            err.to_string(),
            "Batch row 3: Missing required field 'weather_main'"
        );
    }
}
