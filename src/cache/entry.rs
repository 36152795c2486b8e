//! Cache entry with per-entry expiry

use std::time::{Duration, Instant};

/// A stored value together with the instant it stops being live.
///
/// An entry is live iff `now < expires_at`. Once observed expired it is
/// treated as absent and purged lazily on read or by the explicit sweep.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub(crate) value: V,
    pub(crate) expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Whether the entry may still be returned to callers.
    pub fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }

    /// Inverse of [`is_live`](Self::is_live).
    pub fn is_expired(&self) -> bool {
        !self.is_live()
    }
}
