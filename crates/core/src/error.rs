//! Error types for hydrospan

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for hydrospan operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch {
        er: usize,
        ec: usize,
        ar: usize,
        ac: usize,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported threshold method: {0}")]
    UnsupportedMethod(String),

    #[error("Frames out of chronological order: {prev} followed by {next}")]
    SequenceOrderViolation { prev: NaiveDate, next: NaiveDate },

    #[error("Time series is empty (no frames in the selected range)")]
    EmptyTimeSeries,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidParameter`]
    pub fn invalid_parameter(
        name: &'static str,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for hydrospan operations
pub type Result<T> = std::result::Result<T, Error>;
