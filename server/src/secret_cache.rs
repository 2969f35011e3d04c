use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

struct CachedSecret {
    value: String,
    last_fetch: Option<Instant>,
}

/// Holds a single secret value that is trusted for `ttl` after it was stored.
///
/// Readers share the lock, a store excludes everybody else, so a reader never
/// observes a half written value. Expiry is recomputed on every read and
/// nothing else ever invalidates the entry.
pub struct SecretCache {
    entry: RwLock<CachedSecret>,
    ttl: Duration,
}

impl SecretCache {
    pub fn new(ttl: Duration) -> Self {
        SecretCache {
            entry: RwLock::new(CachedSecret {
                value: String::new(),
                last_fetch: None,
            }),
            ttl,
        }
    }

    /// Returns the cached value if it was stored no longer than `ttl` ago.
    /// A zero `ttl` means caching is disabled and this always misses.
    pub fn get(&self) -> Option<String> {
        if self.ttl.is_zero() {
            return None;
        }
        let entry = self.entry.read().unwrap_or_else(PoisonError::into_inner);
        let last_fetch = entry.last_fetch?;
        if last_fetch.elapsed() > self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Replaces the value and restarts its lifetime.
    pub fn set(&self, value: String) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        entry.value = value;
        entry.last_fetch = Some(Instant::now());
    }
}
