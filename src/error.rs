//! Error types for the cross-validation trainer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Checkpoint error at {path}: {reason}")]
    CheckpointError { path: PathBuf, reason: String },

    #[error("Index {index} written twice to the out-of-fold table")]
    DuplicatePrediction { index: usize },

    #[error("Out-of-fold table incomplete: {missing} of {total} indices never predicted")]
    IncompletePredictions { missing: usize, total: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for TrainerError {
    fn from(err: polars::error::PolarsError) -> Self {
        TrainerError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TrainerError {
    fn from(err: ndarray::ShapeError) -> Self {
        TrainerError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrainerError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");

        let err = TrainerError::IncompletePredictions { missing: 3, total: 10 };
        assert_eq!(
            err.to_string(),
            "Out-of-fold table incomplete: 3 of 10 indices never predicted"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TrainerError = io_err.into();
        assert!(matches!(err, TrainerError::IoError(_)));
    }
}
