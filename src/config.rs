//! # Configuration
//!
//! Serde-backed configuration for the cache, circuit breaker, retry, and
//! health subsystems. Defaults match production experience (retry count 3,
//! base delay 1s, failure threshold 5, open cooldown 5 minutes); a TOML
//! file and `UPSTREAM__`-prefixed environment variables can override any
//! field.

use crate::resilience::{BreakerConfig, RetryPolicy};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the external-access core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamCoreConfig {
    pub cache: CacheSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    pub health: HealthSettings,
}

impl UpstreamCoreConfig {
    /// Load configuration from an optional TOML file plus environment
    /// variables (`UPSTREAM__RETRY__MAX_RETRIES=5` style).
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let loaded: Self = builder
            .add_source(
                Environment::with_prefix("UPSTREAM")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        loaded
            .validate()
            .map_err(config::ConfigError::Message)?;
        Ok(loaded)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.health.validate()?;
        Ok(())
    }
}

/// TTL cache behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL applied when a call site does not specify one
    pub default_ttl_seconds: u64,
    /// Interval of the background expired-entry sweep
    pub cleanup_interval_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 300,
            cleanup_interval_seconds: 60,
        }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl_seconds == 0 {
            return Err("cache.default_ttl_seconds must be greater than 0".to_owned());
        }
        if self.cleanup_interval_seconds == 0 {
            return Err("cache.cleanup_interval_seconds must be greater than 0".to_owned());
        }
        Ok(())
    }
}

/// Breaker thresholds, with optional per-operation-key overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open a circuit
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a trial call
    pub cooldown_seconds: u64,
    /// Per-key overrides, e.g. a lower threshold for a flaky upstream
    pub overrides: HashMap<String, ComponentBreakerSettings>,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_seconds: 300,
            overrides: HashMap::new(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Default breaker configuration for keys without an override.
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_seconds),
        }
    }

    /// Per-key breaker configurations derived from the overrides table.
    pub fn override_configs(&self) -> HashMap<String, BreakerConfig> {
        self.overrides
            .iter()
            .map(|(key, component)| (key.clone(), component.breaker_config()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("circuit_breaker.failure_threshold must be greater than 0".to_owned());
        }
        if self.failure_threshold > 100 {
            return Err("circuit_breaker.failure_threshold should not exceed 100".to_owned());
        }
        if self.cooldown_seconds == 0 {
            return Err("circuit_breaker.cooldown_seconds must be greater than 0".to_owned());
        }
        for (key, component) in &self.overrides {
            component
                .validate()
                .map_err(|e| format!("circuit_breaker.overrides.{key}: {e}"))?;
        }
        Ok(())
    }
}

/// Breaker parameters for one operation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentBreakerSettings {
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
}

impl Default for ComponentBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_seconds: 300,
        }
    }
}

impl ComponentBreakerSettings {
    /// Preset for general external API calls.
    pub fn for_external_api() -> Self {
        Self::default()
    }

    /// Preset for metadata search endpoints, which tolerate less
    /// consecutive failure before isolation.
    pub fn for_metadata_search() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_seconds: 120,
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_seconds),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_owned());
        }
        if self.cooldown_seconds == 0 {
            return Err("cooldown_seconds must be greater than 0".to_owned());
        }
        Ok(())
    }
}

/// Retry/backoff bounds applied by `execute` call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Backoff unit in milliseconds
    pub base_delay_ms: u64,
    /// Ceiling on any single backoff sleep, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 300_000,
        }
    }
}

impl RetrySettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries > 20 {
            return Err("retry.max_retries should not exceed 20".to_owned());
        }
        if self.base_delay_ms == 0 {
            return Err("retry.base_delay_ms must be greater than 0".to_owned());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("retry.max_delay_ms must be at least base_delay_ms".to_owned());
        }
        Ok(())
    }
}

/// Health probing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Deadline for a single probe before it is reported unhealthy
    pub probe_timeout_ms: u64,
    /// Successful probes slower than this are reported degraded
    pub slow_threshold_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            slow_threshold_ms: 2_000,
        }
    }
}

impl HealthSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.probe_timeout_ms == 0 {
            return Err("health.probe_timeout_ms must be greater than 0".to_owned());
        }
        if self.slow_threshold_ms >= self.probe_timeout_ms {
            return Err(
                "health.slow_threshold_ms must be below probe_timeout_ms".to_owned(),
            );
        }
        Ok(())
    }
}
