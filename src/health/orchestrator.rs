//! # Health Orchestrator
//!
//! Runs one probe per named external service, throttled through the TTL
//! cache so repeated checks inside the cache window reuse the last result,
//! and folds the individual statuses into one overall report.
//!
//! A probe failure is a status, never an error: timeouts, cancellations,
//! and upstream faults all come back as `Unhealthy` data. Retrying a bad
//! dependency is the job of whatever wraps it in the breaker registry, not
//! of the orchestrator.

use super::probe::{ServiceCheck, ServiceProbe};
use super::status::{aggregate, HealthState, OverallHealthStatus, ServiceHealthStatus};
use crate::cache::TtlCache;
use crate::config::HealthSettings;
use crate::error::UpstreamError;
use chrono::Utc;
use futures::future::join_all;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Multi-service health checker with per-service result caching.
#[derive(Debug)]
pub struct HealthOrchestrator {
    cache: TtlCache<ServiceHealthStatus>,
    probe_timeout: Duration,
    slow_threshold: Duration,
}

impl Default for HealthOrchestrator {
    fn default() -> Self {
        Self::new(&HealthSettings::default())
    }
}

impl HealthOrchestrator {
    pub fn new(settings: &HealthSettings) -> Self {
        Self {
            cache: TtlCache::new(),
            probe_timeout: settings.probe_timeout(),
            slow_threshold: settings.slow_threshold(),
        }
    }

    /// Check one service, serving a cached status when one is still live.
    ///
    /// A zero `cache_ttl` bypasses the cache entirely. The returned status
    /// is always data; this method cannot fail.
    pub async fn check_service(
        &self,
        name: &str,
        probe: &dyn ServiceProbe,
        cache_ttl: Duration,
    ) -> ServiceHealthStatus {
        if !cache_ttl.is_zero() {
            if let Some(status) = self.cache.get(name) {
                debug!(service = %name, state = %status.state, "health status served from cache");
                return status;
            }
        }

        let status = self.run_probe(name, probe).await;

        if !cache_ttl.is_zero() {
            // An invalid name only costs us the throttling, not the check
            let _ = self.cache.set(name, status.clone(), cache_ttl);
        }
        status
    }

    /// Check every service concurrently and fold the statuses.
    ///
    /// Probes are all fired before any is awaited; the report preserves
    /// the order checks were supplied in.
    pub async fn check_all(&self, checks: &[ServiceCheck]) -> OverallHealthStatus {
        let futures = checks
            .iter()
            .map(|check| self.check_service(&check.name, check.probe.as_ref(), check.cache_ttl));
        let services = join_all(futures).await;

        let state = aggregate(services.iter().map(|s| s.state));
        OverallHealthStatus {
            state,
            services,
            checked_at: Utc::now(),
        }
    }

    /// Drop the cached status for `name`, forcing the next check to probe.
    pub fn invalidate(&self, name: &str) -> bool {
        self.cache.remove(name)
    }

    async fn run_probe(&self, name: &str, probe: &dyn ServiceProbe) -> ServiceHealthStatus {
        let started = Instant::now();

        let (state, message, response_time_ms) =
            match tokio::time::timeout(self.probe_timeout, probe.probe()).await {
                Ok(Ok(())) => {
                    let elapsed = started.elapsed();
                    let elapsed_ms = elapsed.as_millis() as u64;
                    if elapsed > self.slow_threshold {
                        (
                            HealthState::Degraded,
                            format!("slow response ({elapsed_ms}ms)"),
                            Some(elapsed_ms),
                        )
                    } else {
                        (
                            HealthState::Healthy,
                            "responding normally".to_owned(),
                            Some(elapsed_ms),
                        )
                    }
                }
                Ok(Err(UpstreamError::Cancelled)) => (
                    HealthState::Unhealthy,
                    "probe cancelled".to_owned(),
                    None,
                ),
                Ok(Err(err)) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    (
                        HealthState::Unhealthy,
                        format!("probe failed: {err}"),
                        Some(elapsed_ms),
                    )
                }
                Err(_) => (
                    HealthState::Unhealthy,
                    format!(
                        "probe timed out after {}ms",
                        self.probe_timeout.as_millis()
                    ),
                    None,
                ),
            };

        match state {
            HealthState::Healthy => {
                debug!(service = %name, response_time_ms = response_time_ms, "health probe succeeded")
            }
            _ => warn!(
                service = %name,
                state = %state,
                message = %message,
                "health probe reported a problem"
            ),
        }

        ServiceHealthStatus {
            service_name: name.to_owned(),
            state,
            message,
            response_time_ms,
            checked_at: Utc::now(),
        }
    }
}
