//! Error types for chart rendering

use std::fmt;

use thiserror::Error;

/// A single parcel's chart could not be produced
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("chart I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("drawing failed: {0}")]
    Backend(String),
}

/// Not an error: the chart was deliberately not produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No point in the series carries numeric values for both metrics
    EmptySeries,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptySeries => write!(f, "series has no numeric points"),
        }
    }
}
