//! # TTL Cache Store
//!
//! String-keyed concurrent cache where every entry carries an expiry
//! instant. Expired entries are purged lazily on read and by the explicit
//! [`cleanup_expired`](TtlCache::cleanup_expired) sweep.
//!
//! `get_or_create` collapses concurrent misses on the same key into a
//! single factory invocation (per-key population lock plus a re-check once
//! the lock is held), so a cold hot-key does not stampede the upstream.

use super::entry::CacheEntry;
use super::errors::{CacheError, CacheResult};
use crate::error::UpstreamError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Occupancy counts reported by [`TtlCache::statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    /// Entries currently held, live or not
    pub total: usize,
    /// Entries past their expiry that have not been swept yet
    pub expired: usize,
    /// Entries that would be returned to a caller right now
    pub active: usize,
}

/// Concurrent TTL cache with single-flight population.
///
/// Per-key operations are atomic (sharded map, no global lock). Values are
/// opaque to the cache and returned by clone.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    population_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            population_locks: DashMap::new(),
        }
    }

    /// Get the value for `key` if present and live.
    ///
    /// An expired entry is removed on observation and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let found_expired = match self.entries.get(key) {
            Some(entry) if entry.is_live() => return Some(entry.value().value.clone()),
            Some(_) => true,
            None => false,
        };

        if found_expired {
            // Re-check under the write lock so a concurrent set() of a
            // fresh value is not discarded.
            self.entries.remove_if(key, |_, entry| entry.is_expired());
            debug!(key = %key, "expired cache entry purged on read");
        }

        None
    }

    /// Store `value` under `key` for `ttl`, overwriting any existing entry.
    ///
    /// Empty or whitespace-only keys are rejected without touching the
    /// store.
    pub fn set(&self, key: &str, value: V, ttl: Duration) -> CacheResult<()> {
        Self::validate_key(key)?;
        self.entries
            .insert(key.to_owned(), CacheEntry::new(value, ttl));
        Ok(())
    }

    /// Remove the entry for `key`, returning whether one was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Return a live value for `key`, populating the cache via `factory` on
    /// a miss.
    ///
    /// Concurrent misses on the same key are single-flight: one caller runs
    /// the factory while the rest wait, then observe the stored value. A
    /// factory failure propagates to the caller that ran it and caches
    /// nothing; the next waiter runs its own invocation.
    ///
    /// An invalid (empty) key still invokes the factory but skips caching.
    pub async fn get_or_create<F, Fut>(&self, key: &str, ttl: Duration, factory: F) -> CacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, UpstreamError>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        if Self::validate_key(key).is_err() {
            debug!("uncacheable key, running factory without storing");
            return factory().await.map_err(CacheError::FactoryFailed);
        }

        let lock = self
            .population_locks
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = lock.lock().await;

        // Double-check: the caller that held the lock before us may have
        // populated the entry already.
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let result = factory().await;
        match result {
            Ok(value) => {
                self.entries
                    .insert(key.to_owned(), CacheEntry::new(value.clone(), ttl));
                drop(_guard);
                self.population_locks.remove(key);
                debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache entry populated");
                Ok(value)
            }
            Err(err) => {
                debug!(key = %key, error = %err, "cache population failed, nothing cached");
                Err(CacheError::FactoryFailed(err))
            }
        }
    }

    /// Sweep every expired entry, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed = removed, "expired cache entries swept");
        }
        removed
    }

    /// Current occupancy counts.
    pub fn statistics(&self) -> CacheStatistics {
        let mut total = 0;
        let mut expired = 0;
        for entry in self.entries.iter() {
            total += 1;
            if entry.value().is_expired() {
                expired += 1;
            }
        }
        CacheStatistics {
            total,
            expired,
            active: total - expired,
        }
    }

    /// Spawn a background task that sweeps expired entries every
    /// `interval` until `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.cleanup_expired();
                    }
                    _ = shutdown.cancelled() => {
                        info!("cache sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    fn validate_key(key: &str) -> CacheResult<()> {
        if key.trim().is_empty() {
            return Err(CacheError::InvalidKey(
                "key must not be empty or whitespace".to_owned(),
            ));
        }
        Ok(())
    }
}
