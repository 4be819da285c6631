//! Error types for response parsing and trend fitting

use thiserror::Error;

/// A parcel's raw response could not be converted into records
#[derive(Debug, Error)]
pub enum ParseError {
    /// Response body does not match the Statistical API shape
    #[error("response shape mismatch: {0}")]
    Shape(#[from] serde_json::Error),

    /// An interval boundary was neither an RFC 3339 timestamp nor a date
    #[error("invalid interval timestamp: {value:?}")]
    Timestamp { value: String },
}

/// The polynomial regression could not be computed
#[derive(Debug, Error)]
pub enum FitError {
    #[error("polynomial fit needs at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    #[error("normal equations are singular")]
    Singular,
}
