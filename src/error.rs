//! # Upstream Failure Taxonomy
//!
//! Closed error taxonomy shared by the execution layer and the health
//! orchestrator. Retryable-vs-terminal classification is a pure function
//! over these variants (see `resilience::classifier`), never a message
//! pattern match.

use std::time::Duration;

/// Failure of a caller-supplied upstream operation or probe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Connection refused, reset, DNS failure, or similar transport fault.
    #[error("network error: {0}")]
    Network(String),

    /// The operation did not complete within its deadline.
    #[error("operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The upstream answered with a non-success status code.
    #[error("upstream returned status {code}")]
    Status { code: u16 },

    /// Caller-initiated cancellation observed by the operation itself.
    #[error("operation cancelled")]
    Cancelled,

    /// The request was malformed or rejected before dispatch.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Anything the taxonomy above does not cover.
    #[error("upstream error: {0}")]
    Other(String),
}

/// Convenience alias for operations that fail with [`UpstreamError`].
pub type UpstreamResult<T> = Result<T, UpstreamError>;
