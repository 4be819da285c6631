//! Error types for the Batch Request Client

use thiserror::Error;

/// The batch-level submission to the remote API failed. Callers treat
/// this at batch granularity: the whole batch is skipped and the run
/// continues.
#[derive(Debug, Error)]
pub enum RemoteRequestError {
    /// OAuth2 token exchange was rejected
    #[error("token exchange rejected with HTTP {status}: {message}")]
    Token { status: u16, message: String },

    /// The statistics endpoint returned a non-success status
    #[error("statistics request rejected with HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport-level failure (connect, timeout, body decode)
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
}
