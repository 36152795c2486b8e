//! # Circuit Breaker Implementation
//!
//! Per-operation circuit breaker preventing cascade failures when an
//! upstream dependency goes bad. Classic three-state machine:
//! Closed (normal operation), Open (failing fast), and HalfOpen (testing
//! recovery).
//!
//! ```text
//! Closed --failure_count >= threshold--> Open
//! Open --cooldown elapsed, next call--> HalfOpen
//! HalfOpen --success--> Closed
//! HalfOpen --failure--> Open (cooldown restarts)
//! ```
//!
//! All bookkeeping is lock-free: state lives in an `AtomicU8`, timestamps
//! in epoch-nanos `AtomicU64`s with Release/Acquire pairing, and the
//! Open -> HalfOpen transition is a CAS so exactly one caller performs it.
//! Bookkeeping is advisory relative to the caller's immediate result: it
//! never masks what the wrapped operation returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Current epoch nanos from SystemTime
#[inline]
fn epoch_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(
        (nanos / 1_000_000_000) as i64,
        (nanos % 1_000_000_000) as u32,
    )
    .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed = 0,
    /// Failing fast, calls are rejected until the cooldown elapses
    Open = 1,
    /// Cooldown elapsed, trial calls allowed to test recovery
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            // Default to the safest state
            _ => CircuitState::Open,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Behavior parameters for a single breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call is allowed
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(300),
        }
    }
}

/// Read-only view of a breaker's bookkeeping, as returned by
/// [`stats`](crate::resilience::CircuitBreakerRegistry::stats).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSnapshot {
    /// Breaker key this snapshot describes
    pub key: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Earliest instant a call will be attempted again; only meaningful
    /// while the breaker is open
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerSnapshot {
    /// Default snapshot for a key no breaker exists for.
    pub fn closed(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            next_attempt_at: None,
        }
    }
}

/// Lifetime call counters for a single breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerCounters {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
}

/// Core circuit breaker with atomic state management.
///
/// Created lazily by the registry on first use of a key and kept for the
/// process lifetime.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Breaker key for logging and snapshots
    key: String,

    /// Current circuit state
    state: AtomicU8,

    /// Consecutive failures observed since the last success
    failure_count: AtomicU32,

    /// Epoch nanos of the most recent failure (0 = never)
    last_failure_at_nanos: AtomicU64,

    /// Epoch nanos before which calls are rejected (0 = none).
    /// Stored before the state flips to Open, Release/Acquire paired.
    next_attempt_at_nanos: AtomicU64,

    total_calls: AtomicU64,
    success_total: AtomicU64,
    failure_total: AtomicU64,

    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(key: String, config: BreakerConfig) -> Self {
        info!(
            breaker = %key,
            failure_threshold = config.failure_threshold,
            cooldown_secs = config.cooldown.as_secs(),
            "circuit breaker initialized"
        );

        Self {
            key,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            last_failure_at_nanos: AtomicU64::new(0),
            next_attempt_at_nanos: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
            success_total: AtomicU64::new(0),
            failure_total: AtomicU64::new(0),
            config: BreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                cooldown: config.cooldown,
            },
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Gate a call on the current state.
    ///
    /// Returns `Err(next_attempt_at)` while the circuit is open and the
    /// cooldown has not elapsed. Once it has elapsed, the first caller to
    /// arrive wins the CAS to HalfOpen and every caller proceeds.
    pub fn try_acquire(&self) -> Result<(), DateTime<Utc>> {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let next_attempt = self.next_attempt_at_nanos.load(Ordering::Acquire);
                let now = epoch_nanos_now();
                if now < next_attempt {
                    return Err(nanos_to_datetime(next_attempt));
                }

                let won = self
                    .state
                    .compare_exchange(
                        CircuitState::Open as u8,
                        CircuitState::HalfOpen as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if won {
                    info!(breaker = %self.key, "circuit breaker half-open (testing recovery)");
                }
                Ok(())
            }
        }
    }

    /// Record a successful operation.
    ///
    /// A single success while half-open, or with failures on the books,
    /// closes the circuit and resets the failure count.
    pub fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_total.fetch_add(1, Ordering::Relaxed);

        if self.state() != CircuitState::Closed {
            self.transition_to_closed();
        } else if self.failure_count.load(Ordering::Acquire) > 0 {
            self.failure_count.store(0, Ordering::Release);
            debug!(breaker = %self.key, "failure count reset after success");
        }
    }

    /// Record a failed operation and apply the transition rule.
    pub fn record_failure(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_total.fetch_add(1, Ordering::Relaxed);
        self.last_failure_at_nanos
            .store(epoch_nanos_now(), Ordering::Release);

        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;

        match self.state() {
            CircuitState::Closed => {
                if failures >= self.config.failure_threshold {
                    self.transition_to_open(failures);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during the trial re-opens with a fresh cooldown
                self.transition_to_open(failures);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the circuit closed, clearing the failure bookkeeping.
    /// Administrative override used by recovery tooling.
    pub fn force_closed(&self) {
        self.transition_to_closed();
    }

    /// Force the circuit open, starting a fresh cooldown.
    pub fn force_open(&self) {
        warn!(breaker = %self.key, "circuit breaker forced open");
        self.transition_to_open(self.failure_count.load(Ordering::Acquire));
    }

    /// Read-only snapshot of the breaker's bookkeeping.
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let state = self.state();
        let last_failure = self.last_failure_at_nanos.load(Ordering::Acquire);
        let next_attempt = self.next_attempt_at_nanos.load(Ordering::Acquire);

        CircuitBreakerSnapshot {
            key: self.key.clone(),
            state,
            failure_count: self.failure_count.load(Ordering::Acquire),
            last_failure_at: (last_failure != 0).then(|| nanos_to_datetime(last_failure)),
            next_attempt_at: (state == CircuitState::Open && next_attempt != 0)
                .then(|| nanos_to_datetime(next_attempt)),
        }
    }

    /// Lifetime call counters.
    pub fn counters(&self) -> BreakerCounters {
        BreakerCounters {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            success_count: self.success_total.load(Ordering::Relaxed),
            failure_count: self.failure_total.load(Ordering::Relaxed),
        }
    }

    fn transition_to_closed(&self) {
        self.failure_count.store(0, Ordering::Release);
        self.next_attempt_at_nanos.store(0, Ordering::Release);
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);

        info!(breaker = %self.key, "circuit breaker closed (recovered)");
    }

    fn transition_to_open(&self, failures: u32) {
        let next_attempt = epoch_nanos_now() + self.config.cooldown.as_nanos() as u64;
        // Timestamp first so any observer of Open sees a valid gate
        self.next_attempt_at_nanos
            .store(next_attempt, Ordering::Release);
        self.state.store(CircuitState::Open as u8, Ordering::Release);

        warn!(
            breaker = %self.key,
            consecutive_failures = failures,
            failure_threshold = self.config.failure_threshold,
            cooldown_secs = self.config.cooldown.as_secs(),
            "circuit breaker opened (failing fast)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test".to_owned(),
            BreakerConfig {
                failure_threshold: threshold,
                cooldown,
            },
        )
    }

    #[test]
    fn starts_closed_with_clean_books() {
        let cb = breaker(3, Duration::from_secs(1));
        assert_eq!(cb.state(), CircuitState::Closed);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.failure_count, 0);
        assert!(snapshot.last_failure_at.is_none());
        assert!(snapshot.next_attempt_at.is_none());
    }

    #[test]
    fn opens_when_failure_threshold_is_reached() {
        let cb = breaker(3, Duration::from_secs(60));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.failure_count, 3);
        assert!(snapshot.last_failure_at.is_some());
        assert!(snapshot.next_attempt_at.is_some());
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn success_resets_failure_count_while_closed() {
        let cb = breaker(3, Duration::from_secs(60));

        cb.record_failure();
        cb.record_failure();
        cb.record_success();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[test]
    fn elapsed_cooldown_transitions_to_half_open_on_next_call() {
        let cb = breaker(1, Duration::from_millis(20));

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_err());

        std::thread::sleep(Duration::from_millis(40));

        assert!(cb.try_acquire().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_success_closes_the_circuit() {
        let cb = breaker(1, Duration::from_millis(10));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        cb.try_acquire().unwrap();

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[test]
    fn half_open_failure_reopens_with_fresh_cooldown() {
        let cb = breaker(1, Duration::from_millis(30));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(50));
        cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn force_operations_override_state() {
        let cb = breaker(5, Duration::from_secs(60));

        cb.force_open();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.force_closed();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn counters_track_lifetime_calls() {
        let cb = breaker(5, Duration::from_secs(60));

        cb.record_success();
        cb.record_failure();
        cb.record_success();

        let counters = cb.counters();
        assert_eq!(counters.total_calls, 3);
        assert_eq!(counters.success_count, 2);
        assert_eq!(counters.failure_count, 1);
    }
}
