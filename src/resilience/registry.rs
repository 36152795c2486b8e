//! # Circuit Breaker Registry
//!
//! One breaker state machine per logical operation key, created lazily on
//! first use and kept for the process lifetime. `execute` wraps a
//! caller-supplied async operation with breaker gating, bounded retries,
//! and jittered exponential backoff.
//!
//! Breaker entries are never evicted; long-running processes that mint
//! dynamic keys should prefer a small set of stable operation keys (see
//! [`breaker_keys`](CircuitBreakerRegistry::breaker_keys) and
//! [`reset_all`](CircuitBreakerRegistry::reset_all) for the operational
//! levers).

use super::backoff::retry_delay;
use super::circuit_breaker::{
    BreakerCounters, BreakerConfig, CircuitBreaker, CircuitBreakerSnapshot, CircuitState,
};
use super::classifier::{DefaultRetryClassifier, FailureDisposition, RetryClassifier};
use super::errors::{ExecuteError, ExecuteResult};
use crate::error::UpstreamError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retry parameters for a single `execute` call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first (0 = no retries)
    pub max_retries: u32,
    /// Backoff unit; retry n sleeps `base_delay * 2^(n-1)` plus jitter
    pub base_delay: Duration,
    /// Ceiling on any single backoff sleep
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Registry of per-key circuit breakers with retry/backoff execution.
///
/// Construct one per composing application and hand out references;
/// isolated instances keep tests hermetic.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    classifier: Arc<dyn RetryClassifier>,
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.breakers.len())
            .field("default_config", &self.default_config)
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            overrides: HashMap::new(),
            classifier: Arc::new(DefaultRetryClassifier),
        }
    }

    /// Per-key configuration overrides for breakers not yet created.
    pub fn with_overrides(mut self, overrides: HashMap<String, BreakerConfig>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Swap in a caller-supplied retryability policy.
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Execute `operation` under the breaker for `key` with retry/backoff.
    ///
    /// While the breaker is open and the cooldown has not elapsed the
    /// operation is not invoked at all. Retryable failures are retried up
    /// to `policy.max_retries` times with jittered exponential backoff;
    /// cancellation aborts waiting immediately and is never retried.
    pub async fn execute<T, F, Fut>(
        &self,
        key: &str,
        operation: F,
        policy: &RetryPolicy,
        cancellation: &CancellationToken,
    ) -> ExecuteResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        if cancellation.is_cancelled() {
            return Err(ExecuteError::Cancelled);
        }

        let breaker = self.breaker(key);
        if let Err(next_attempt_at) = breaker.try_acquire() {
            debug!(
                breaker = %key,
                next_attempt_at = %next_attempt_at,
                "call rejected, circuit open"
            );
            return Err(ExecuteError::CircuitOpen {
                key: key.to_owned(),
                next_attempt_at,
            });
        }

        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(ExecuteError::Cancelled),
                outcome = operation() => outcome,
            };

            match outcome {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(value);
                }
                Err(err) => match self.classifier.classify(&err) {
                    FailureDisposition::Cancelled => {
                        debug!(breaker = %key, "operation observed cancellation");
                        return Err(ExecuteError::Cancelled);
                    }
                    FailureDisposition::Retry if attempt < policy.max_retries => {
                        breaker.record_failure();
                        let delay = retry_delay(attempt + 1, policy.base_delay, policy.max_delay);
                        warn!(
                            breaker = %key,
                            attempt = attempt + 1,
                            max_attempts = policy.max_retries + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retryable failure, backing off"
                        );
                        tokio::select! {
                            biased;
                            _ = cancellation.cancelled() => return Err(ExecuteError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                    }
                    disposition => {
                        breaker.record_failure();
                        warn!(
                            breaker = %key,
                            attempts = attempt + 1,
                            disposition = ?disposition,
                            error = %err,
                            "operation failed terminally"
                        );
                        return Err(ExecuteError::OperationFailed {
                            key: key.to_owned(),
                            attempts: attempt + 1,
                            source: err,
                        });
                    }
                },
            }
        }
    }

    /// Read-only snapshot for `key`.
    ///
    /// Unknown keys yield a default closed snapshot; no breaker state is
    /// created as a side effect.
    pub fn stats(&self, key: &str) -> CircuitBreakerSnapshot {
        self.breakers
            .get(key)
            .map(|breaker| breaker.snapshot())
            .unwrap_or_else(|| CircuitBreakerSnapshot::closed(key))
    }

    /// Lifetime call counters for `key`, if a breaker exists.
    pub fn counters(&self, key: &str) -> Option<BreakerCounters> {
        self.breakers.get(key).map(|breaker| breaker.counters())
    }

    /// Force-close every breaker. Administrative override for recovery
    /// tooling, not general traffic.
    pub fn reset_all(&self) {
        let count = self.breakers.len();
        for entry in self.breakers.iter() {
            entry.value().force_closed();
        }
        info!(breakers = count, "all circuit breakers force-closed");
    }

    /// Force a single breaker open (emergency isolation of one upstream).
    /// No-op if the key has never executed.
    pub fn force_open(&self, key: &str) -> bool {
        match self.breakers.get(key) {
            Some(breaker) => {
                breaker.force_open();
                true
            }
            None => false,
        }
    }

    /// Keys that currently have breaker state.
    pub fn breaker_keys(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    /// Count of breakers in each state.
    pub fn count_by_state(&self) -> HashMap<CircuitState, usize> {
        let mut counts = HashMap::new();
        for entry in self.breakers.iter() {
            *counts.entry(entry.value().state()).or_insert(0) += 1;
        }
        counts
    }

    /// Fraction of breakers currently closed (1.0 when none exist).
    pub fn health_score(&self) -> f64 {
        if self.breakers.is_empty() {
            return 1.0;
        }
        let closed = self
            .breakers
            .iter()
            .filter(|e| e.value().state() == CircuitState::Closed)
            .count();
        closed as f64 / self.breakers.len() as f64
    }

    /// Lazily create (insert-if-absent) the breaker for `key`.
    fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return Arc::clone(existing.value());
        }

        let config = self
            .overrides
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone());
        let entry = self
            .breakers
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key.to_owned(), config)));
        Arc::clone(entry.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn registry(threshold: u32, cooldown: Duration) -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(BreakerConfig {
            failure_threshold: threshold,
            cooldown,
        })
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn success_passes_the_value_through() {
        let registry = registry(5, Duration::from_secs(60));
        let token = CancellationToken::new();

        let value = registry
            .execute(
                "svc",
                || async { Ok::<_, UpstreamError>(42u32) },
                &RetryPolicy::default(),
                &token,
            )
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(registry.stats("svc").state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn retryable_failures_are_retried_to_the_bound() {
        let registry = registry(50, Duration::from_secs(60));
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: ExecuteResult<u32> = registry
            .execute(
                "svc",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::Status { code: 503 })
                },
                &fast_policy(2),
                &token,
            )
            .await;

        assert!(matches!(
            result,
            Err(ExecuteError::OperationFailed { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_failure_consumes_a_single_attempt() {
        let registry = registry(50, Duration::from_secs(60));
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: ExecuteResult<u32> = registry
            .execute(
                "svc",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::Status { code: 404 })
                },
                &fast_policy(3),
                &token,
            )
            .await;

        assert!(matches!(
            result,
            Err(ExecuteError::OperationFailed { attempts: 1, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stats_for_unknown_key_creates_no_state() {
        let registry = registry(5, Duration::from_secs(60));

        let snapshot = registry.stats("never-used");
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert!(registry.breaker_keys().is_empty());
    }

    #[tokio::test]
    async fn per_key_overrides_apply_on_first_use() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "fragile".to_owned(),
            BreakerConfig {
                failure_threshold: 1,
                cooldown: Duration::from_secs(60),
            },
        );
        let registry =
            registry(50, Duration::from_secs(60)).with_overrides(overrides);
        let token = CancellationToken::new();

        let _ = registry
            .execute(
                "fragile",
                || async { Err::<u32, _>(UpstreamError::Status { code: 404 }) },
                &fast_policy(0),
                &token,
            )
            .await;

        assert_eq!(registry.stats("fragile").state, CircuitState::Open);
    }

    #[tokio::test]
    async fn reset_all_force_closes_open_breakers() {
        let registry = registry(1, Duration::from_secs(600));
        let token = CancellationToken::new();

        let _ = registry
            .execute(
                "svc",
                || async { Err::<u32, _>(UpstreamError::Network("down".into())) },
                &fast_policy(0),
                &token,
            )
            .await;
        assert_eq!(registry.stats("svc").state, CircuitState::Open);

        registry.reset_all();
        assert_eq!(registry.stats("svc").state, CircuitState::Closed);
        assert_eq!(registry.stats("svc").failure_count, 0);
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let registry = registry(5, Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();

        let result: ExecuteResult<u32> = registry
            .execute(
                "svc",
                || async { Ok(1u32) },
                &RetryPolicy::default(),
                &token,
            )
            .await;

        assert!(matches!(result, Err(ExecuteError::Cancelled)));
        assert!(registry.breaker_keys().is_empty());
    }

    #[tokio::test]
    async fn state_summary_counts_breakers() {
        let registry = registry(1, Duration::from_secs(600));
        let token = CancellationToken::new();

        let _ = registry
            .execute(
                "ok",
                || async { Ok::<_, UpstreamError>(1u32) },
                &fast_policy(0),
                &token,
            )
            .await;
        let _ = registry
            .execute(
                "bad",
                || async { Err::<u32, _>(UpstreamError::Network("down".into())) },
                &fast_policy(0),
                &token,
            )
            .await;

        let counts = registry.count_by_state();
        assert_eq!(counts.get(&CircuitState::Closed), Some(&1));
        assert_eq!(counts.get(&CircuitState::Open), Some(&1));
        assert!((registry.health_score() - 0.5).abs() < f64::EPSILON);
    }
}
