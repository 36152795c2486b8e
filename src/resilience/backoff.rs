//! Exponential backoff with jitter.

use std::time::Duration;

/// Jitter ceiling as a fraction of the computed delay.
const JITTER_FACTOR: f64 = 0.1;

/// Delay before retry number `attempt` (1-based).
///
/// `base_delay * 2^(attempt-1)`, stretched by up to 10% of random jitter so
/// synchronized clients do not retry in lockstep, capped at `max_delay`.
/// Attempt 0 is the initial call and sleeps nothing.
pub fn retry_delay(attempt: u32, base_delay: Duration, max_delay: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential = base_delay.saturating_mul(2u32.saturating_pow(attempt - 1));
    let capped = exponential.min(max_delay);

    let jitter = fastrand::f64() * JITTER_FACTOR;
    capped.mul_f64(1.0 + jitter).min(max_delay)
}
