//! Error taxonomy surfaced to callers.
//!
//! Defined in `paperforge-core` so stores and front ends can return these
//! through `anyhow` and the caller can still classify them by downcasting.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a generation or grading request before work starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaperError {
    /// A required field is missing or malformed, or the request is too large.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blueprint, candidate pool or submitted question does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is being rate limited.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Classification of any error surfaced by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    ResourceExhausted,
    Internal,
}

impl ErrorKind {
    /// Stable wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::NotFound => "not-found",
            ErrorKind::ResourceExhausted => "resource-exhausted",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl PaperError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PaperError::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        PaperError::NotFound(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PaperError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PaperError::NotFound(_) => ErrorKind::NotFound,
            PaperError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
        }
    }

    /// Classify an `anyhow::Error` by looking for a `PaperError` anywhere in
    /// its context chain. Anything else is `Internal`.
    pub fn kind_of(err: &anyhow::Error) -> ErrorKind {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<PaperError>())
            .map(PaperError::kind)
            .unwrap_or(ErrorKind::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(ErrorKind::InvalidArgument.code(), "invalid-argument");
        assert_eq!(ErrorKind::NotFound.to_string(), "not-found");
        assert_eq!(
            serde_json::to_string(&ErrorKind::ResourceExhausted).unwrap(),
            "\"resource-exhausted\""
        );
    }

    #[test]
    fn kind_of_sees_through_context() {
        let err: anyhow::Result<()> =
            Err(PaperError::not_found("blueprint maths_p1_gr12")).context("loading blueprint");
        let err = err.unwrap_err();
        assert_eq!(PaperError::kind_of(&err), ErrorKind::NotFound);
        assert!(format!("{err:#}").contains("maths_p1_gr12"));
    }

    #[test]
    fn foreign_errors_are_internal() {
        let err = anyhow::anyhow!("connection reset");
        assert_eq!(PaperError::kind_of(&err), ErrorKind::Internal);
    }
}
