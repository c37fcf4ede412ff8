//! Errors raised while building domain values.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Rejected input to a domain constructor or parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Out-of-range or malformed field (job name, priority, price rule).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An id string that does not parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
