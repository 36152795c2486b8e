//! Execution error types

use crate::error::UpstreamError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Terminal outcome of [`execute`](crate::resilience::CircuitBreakerRegistry::execute).
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The breaker rejected the call without invoking the operation
    #[error("circuit breaker '{key}' is open until {next_attempt_at}")]
    CircuitOpen {
        key: String,
        next_attempt_at: DateTime<Utc>,
    },

    /// Retries exhausted or a non-retryable failure occurred
    #[error("operation '{key}' failed after {attempts} attempt(s): {source}")]
    OperationFailed {
        key: String,
        attempts: u32,
        #[source]
        source: UpstreamError,
    },

    /// Caller-initiated cancellation during wait or backoff sleep
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for breaker-gated execution.
pub type ExecuteResult<T> = Result<T, ExecuteError>;
