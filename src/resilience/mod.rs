//! # Resilience Module
//!
//! Circuit breaking with bounded retries and jittered exponential backoff
//! for calls into external services. One breaker state machine exists per
//! logical operation key ("tmdb-search", "sonarr-status", ...); the
//! registry creates them lazily and wraps caller-supplied async operations
//! with breaker-gated execution.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use upstream_core::resilience::{BreakerConfig, CircuitBreakerRegistry, RetryPolicy};
//! use upstream_core::UpstreamError;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CircuitBreakerRegistry::new(BreakerConfig::default());
//! let token = CancellationToken::new();
//!
//! let body = registry
//!     .execute(
//!         "tmdb-search",
//!         || async {
//!             // upstream call here
//!             Ok::<_, UpstreamError>("results".to_owned())
//!         },
//!         &RetryPolicy::default(),
//!         &token,
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod errors;
pub mod registry;

pub use backoff::retry_delay;
pub use circuit_breaker::{
    BreakerConfig, BreakerCounters, CircuitBreaker, CircuitBreakerSnapshot, CircuitState,
};
pub use classifier::{
    DefaultRetryClassifier, FailureDisposition, RetryClassifier, RETRYABLE_STATUS_CODES,
};
pub use errors::{ExecuteError, ExecuteResult};
pub use registry::{CircuitBreakerRegistry, RetryPolicy};
