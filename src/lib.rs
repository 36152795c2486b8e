//! # Upstream Core
//!
//! Resilient external-access core for applications that talk to flaky
//! third-party services: a TTL cache with single-flight population, a
//! per-operation circuit breaker registry with retry/backoff, and a
//! multi-service health orchestrator.
//!
//! ## Overview
//!
//! API clients, controllers, and business rules live in the composing
//! application. They call into this crate through a small surface: hand
//! the breaker registry an async operation to run under a stable key,
//! independently cache its result for a TTL, and ask the health
//! orchestrator for a cache-throttled status report across every
//! dependency.
//!
//! ## Module Organization
//!
//! - [`cache`] - TTL cache with lazy expiry, sweep, and single-flight
//!   `get_or_create`
//! - [`resilience`] - circuit breaker registry, retry/backoff execution,
//!   failure classification
//! - [`health`] - probe orchestration and status aggregation
//! - [`config`] - serde configuration with file + environment loading
//! - [`error`] - the closed upstream failure taxonomy
//! - [`logging`] - environment-aware structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use upstream_core::{BreakerConfig, CircuitBreakerRegistry, RetryPolicy, TtlCache, UpstreamError};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CircuitBreakerRegistry::new(BreakerConfig::default());
//! let cache: TtlCache<String> = TtlCache::new();
//! let token = CancellationToken::new();
//!
//! let results = registry
//!     .execute(
//!         "tmdb-search",
//!         || async { Ok::<_, UpstreamError>("search results".to_owned()) },
//!         &RetryPolicy::default(),
//!         &token,
//!     )
//!     .await?;
//!
//! cache.set("search:batman", results, Duration::from_secs(300))?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod resilience;

pub use cache::{CacheError, CacheStatistics, TtlCache};
pub use config::{
    CacheSettings, CircuitBreakerSettings, ComponentBreakerSettings, HealthSettings,
    RetrySettings, UpstreamCoreConfig,
};
pub use error::{UpstreamError, UpstreamResult};
pub use health::{
    HealthOrchestrator, HealthState, OverallHealthStatus, ProbeFn, ServiceCheck,
    ServiceHealthStatus, ServiceProbe,
};
pub use resilience::{
    BreakerConfig, CircuitBreakerRegistry, CircuitBreakerSnapshot, CircuitState,
    DefaultRetryClassifier, ExecuteError, ExecuteResult, FailureDisposition, RetryClassifier,
    RetryPolicy,
};
