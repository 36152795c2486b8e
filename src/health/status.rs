//! # Health Status Types
//!
//! Status vocabulary shared with the resilience layer and the aggregation
//! rule that folds per-service statuses into one overall report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a single service or of the system as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Probe succeeded within the latency threshold
    Healthy,
    /// Responding, but slower than the configured slow threshold
    Degraded,
    /// Probe failed, timed out, or was cancelled
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Outcome of probing one named external service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealthStatus {
    pub service_name: String,
    pub state: HealthState,
    pub message: String,
    /// Observed probe latency; absent when the probe never answered
    pub response_time_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

/// All service statuses folded into one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallHealthStatus {
    pub state: HealthState,
    /// Per-service statuses in the order the checks were supplied
    pub services: Vec<ServiceHealthStatus>,
    pub checked_at: DateTime<Utc>,
}

/// Fold individual severities into an overall one.
///
/// Any Degraded service downgrades the report to Degraded even when
/// another service is Unhealthy; Unhealthy wins only when nothing is
/// merely Degraded. Preserved source behavior, confirmed as a product
/// decision (see DESIGN.md). No services means nothing failing.
pub fn aggregate<I>(states: I) -> HealthState
where
    I: IntoIterator<Item = HealthState>,
{
    let mut any_degraded = false;
    let mut any_unhealthy = false;
    for state in states {
        match state {
            HealthState::Degraded => any_degraded = true,
            HealthState::Unhealthy => any_unhealthy = true,
            HealthState::Healthy => {}
        }
    }

    if any_degraded {
        HealthState::Degraded
    } else if any_unhealthy {
        HealthState::Unhealthy
    } else {
        HealthState::Healthy
    }
}
