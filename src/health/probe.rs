//! Probe seam for health checks.
//!
//! A probe is a lightweight, idempotent, side-effect-free operation used
//! purely to assess whether a dependency is responsive. Probes report
//! failure through [`UpstreamError`]; the orchestrator turns that into a
//! status, never into an error for the caller.

use crate::error::UpstreamError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A health probe for one external service.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn probe(&self) -> Result<(), UpstreamError>;
}

/// Adapter turning an async closure into a [`ServiceProbe`].
pub struct ProbeFn<F>(F);

impl<F> ProbeFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> ServiceProbe for ProbeFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), UpstreamError>> + Send,
{
    async fn probe(&self) -> Result<(), UpstreamError> {
        (self.0)().await
    }
}

/// One named service registered for [`check_all`](crate::health::HealthOrchestrator::check_all).
#[derive(Clone)]
pub struct ServiceCheck {
    pub name: String,
    /// How long a probe result may be served from cache; zero disables
    /// throttling for this service
    pub cache_ttl: Duration,
    pub probe: Arc<dyn ServiceProbe>,
}

impl ServiceCheck {
    pub fn new(
        name: impl Into<String>,
        cache_ttl: Duration,
        probe: Arc<dyn ServiceProbe>,
    ) -> Self {
        Self {
            name: name.into(),
            cache_ttl,
            probe,
        }
    }
}

impl std::fmt::Debug for ServiceCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCheck")
            .field("name", &self.name)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}
