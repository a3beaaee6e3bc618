//! Store error types.

use thiserror::Error;

/// Errors that can occur when talking to a question store.
///
/// Missing blueprints are reported as `PaperError::NotFound` so callers can
/// classify them the same way for every store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The store returned an error response.
    #[error("store error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The store answered with something that is not the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The store could not be reached.
    #[error("network error: {0}")]
    NetworkError(String),

    /// A question bank file is inconsistent.
    #[error("invalid question bank {path}: {message}")]
    InvalidBank { path: String, message: String },
}
