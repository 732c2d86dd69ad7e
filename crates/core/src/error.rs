//! Domain error model.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the domain and service layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every kind is a distinct, stable outcome so callers at the boundary can
/// branch on it (retry on `ConcurrencyFailure`, surface a conflict on
/// `OutOfStock`, and so on). Any of these aborts the whole unit of work it
/// was raised in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or empty input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A referenced order or product does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stock was insufficient at the authoritative, lock-time check.
    #[error("out of stock: {0}")]
    OutOfStock(String),

    /// The requested status is not reachable from the current status.
    #[error("invalid status change: {0}")]
    InvalidStatusChange(String),

    /// A row lock could not be acquired within the lock timeout.
    ///
    /// The caller is expected to retry (with backoff); nothing retries internally.
    #[error("concurrency failure: {0}")]
    ConcurrencyFailure(String),

    /// Storage or lock-protocol fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn out_of_stock(msg: impl Into<String>) -> Self {
        Self::OutOfStock(msg.into())
    }

    pub fn invalid_status_change(msg: impl Into<String>) -> Self {
        Self::InvalidStatusChange(msg.into())
    }

    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::ConcurrencyFailure(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidRequest(_) => "INVALID_REQUEST",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::OutOfStock(_) => "OUT_OF_STOCK",
            DomainError::InvalidStatusChange(_) => "INVALID_STATUS_CHANGE",
            DomainError::ConcurrencyFailure(_) => "CONCURRENCY_FAILURE",
            DomainError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status a request boundary should answer with.
    pub fn status_hint(&self) -> u16 {
        match self {
            DomainError::InvalidRequest(_) => 400,
            DomainError::NotFound(_) => 404,
            DomainError::OutOfStock(_)
            | DomainError::InvalidStatusChange(_)
            | DomainError::ConcurrencyFailure(_) => 409,
            DomainError::Internal(_) => 500,
        }
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::ConcurrencyFailure(_))
    }

    pub fn message(&self) -> &str {
        match self {
            DomainError::InvalidRequest(msg)
            | DomainError::NotFound(msg)
            | DomainError::OutOfStock(msg)
            | DomainError::InvalidStatusChange(msg)
            | DomainError::ConcurrencyFailure(msg)
            | DomainError::Internal(msg) => msg,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.message().to_string(),
        }
    }
}

/// Serializable error representation for request boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}
