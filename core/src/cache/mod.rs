//! Result cache: TTL-bounded key/value storage addressed by [`ContentKey`].
//!
//! The cache is an optimization, never a source of truth:
//! - `get` returns `None` when the backing store is unavailable, the key is
//!   absent, or the entry is older than its TTL (lazy expiry at read time)
//! - `set` is best-effort; store failures are logged and swallowed
//! - if the store does not answer the startup probe, the cache degrades to a
//!   disabled no-op for the lifetime of the process
//!
//! Backends implement [`CacheStore`]: [`MemoryStore`] (DashMap) always, and
//! `RocksDbCacheStore` with the `persistent` feature.

mod clock;
mod memory;
#[cfg(feature = "persistent")]
mod rocks;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::{glob_match, MemoryStore};
#[cfg(feature = "persistent")]
pub use rocks::RocksDbCacheStore;

use crate::key::ContentKey;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long the startup probe may take before the store is declared unreachable
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// A stored value together with its freshness metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>, stored_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            stored_at,
            ttl,
        }
    }

    /// Expired once `stored_at + ttl < now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age_ms = (now - self.stored_at).num_milliseconds();
        age_ms > self.ttl.as_millis() as i64
    }
}

/// Backing key/value store with TTL metadata.
///
/// Keys are storage keys rendered by [`ContentKey::storage_key`]. Each key's
/// get/set must be atomic at the store level; no multi-key transactions are needed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Startup availability probe
    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store `entry` under `key`, replacing any previous value (SETEX semantics)
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;

    /// Keys matching a glob pattern (`*` and `?` wildcards)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Delete the given keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<usize>;

    /// Drop every entry expired at `now`. Stores without a sweep return 0.
    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
        Ok(0)
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL cache over an optional backing store
pub struct ResultCache {
    store: Option<Arc<dyn CacheStore>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl ResultCache {
    /// Probe `store` and enable caching if it answers, otherwise degrade to disabled.
    pub async fn connect(store: Arc<dyn CacheStore>) -> Self {
        Self::connect_with_clock(store, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        let probe = tokio::time::timeout(PING_TIMEOUT, store.ping()).await;
        let store = match probe {
            Ok(Ok(())) => {
                info!(target = "cache", "Result cache enabled");
                Some(store)
            }
            Ok(Err(e)) => {
                warn!(target = "cache", error = %e, "Cache store unavailable; caching disabled");
                None
            }
            Err(_) => {
                warn!(
                    target = "cache",
                    timeout_ms = PING_TIMEOUT.as_millis() as u64,
                    "Cache store did not answer; caching disabled"
                );
                None
            }
        };
        Self::from_parts(store, clock)
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self::from_parts(None, Arc::new(SystemClock))
    }

    fn from_parts(store: Option<Arc<dyn CacheStore>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn get(&self, key: &ContentKey) -> Option<Vec<u8>> {
        let store = self.store.as_ref()?;
        let storage_key = key.storage_key();

        let entry = match store.get(&storage_key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(target = "cache", key = %storage_key, error = %e, "Cache read failed");
                return None;
            }
        };

        // Expired entries stay in the store until `sweep`: another writer may
        // have replaced the value since this read.
        if entry.is_expired(self.clock.now()) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(target = "cache", key = %storage_key, "Cache entry expired");
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(target = "cache", key = %storage_key, bytes = entry.value.len(), "Cache hit");
        Some(entry.value)
    }

    pub async fn set(&self, key: &ContentKey, value: &[u8], ttl: Duration) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let storage_key = key.storage_key();
        let entry = CacheEntry::new(value.to_vec(), self.clock.now(), ttl);
        match store.set(&storage_key, entry).await {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target = "cache",
                    key = %storage_key,
                    bytes = value.len(),
                    ttl_s = ttl.as_secs(),
                    "Cached value"
                );
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(target = "cache", key = %storage_key, error = %e, "Cache write failed");
            }
        }
    }

    /// Typed read of a JSON-encoded value; undecodable entries read as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &ContentKey) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_slice(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(target = "cache", key = %key, error = %e, "Cached value is not valid JSON");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &ContentKey, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(raw) => self.set(key, &raw, ttl).await,
            Err(e) => warn!(target = "cache", key = %key, error = %e, "Failed to encode value for cache"),
        }
    }

    /// Delete every key matching `pattern` (e.g. `tts:*`, `qa:ru:*`).
    pub async fn invalidate(&self, pattern: &str) -> usize {
        let Some(store) = self.store.as_ref() else {
            return 0;
        };
        let keys = match store.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(target = "cache", pattern = %pattern, error = %e, "Cache key scan failed");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }
        match store.delete(&keys).await {
            Ok(n) => {
                info!(target = "cache", pattern = %pattern, deleted = n, "Cache invalidated");
                n
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(target = "cache", pattern = %pattern, error = %e, "Cache invalidation failed");
                0
            }
        }
    }

    /// Remove expired entries now; returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let Some(store) = self.store.as_ref() else {
            return 0;
        };
        match store.purge_expired(self.clock.now()).await {
            Ok(n) => {
                if n > 0 {
                    debug!(target = "cache", purged = n, "Swept expired entries");
                }
                n
            }
            Err(e) => {
                warn!(target = "cache", error = %e, "Cache sweep failed");
                0
            }
        }
    }

    /// Periodically sweep expired entries. Returns `None` when caching is disabled.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            return None;
        }
        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep().await;
            }
        }))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.is_enabled())
            .field("stats", &self.stats())
            .finish()
    }
}
