use async_trait::async_trait;
use chrono::Utc;
use podium_core::{
    CacheEntry, CacheStore, Clock, ContentKey, ManualClock, MemoryStore, PodiumError, ResultCache,
    Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Store whose every operation fails, like an unreachable server
struct DownStore {
    calls: AtomicUsize,
}

#[async_trait]
impl CacheStore for DownStore {
    async fn ping(&self) -> Result<()> {
        Err(PodiumError::CacheUnavailable("connection refused".into()))
    }
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PodiumError::CacheUnavailable("down".into()))
    }
    async fn set(&self, _key: &str, _entry: CacheEntry) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PodiumError::CacheUnavailable("down".into()))
    }
    async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        Err(PodiumError::CacheUnavailable("down".into()))
    }
    async fn delete(&self, _keys: &[String]) -> Result<usize> {
        Err(PodiumError::CacheUnavailable("down".into()))
    }
}

// Store that answers the probe but fails reads and writes afterwards
struct FlakyStore;

#[async_trait]
impl CacheStore for FlakyStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Err(PodiumError::CacheUnavailable("timeout".into()))
    }
    async fn set(&self, _key: &str, _entry: CacheEntry) -> Result<()> {
        Err(PodiumError::CacheUnavailable("timeout".into()))
    }
    async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _keys: &[String]) -> Result<usize> {
        Ok(0)
    }
}

// Shared store seen through a read that raced with another writer
struct StaleReadStore {
    inner: Arc<MemoryStore>,
    stale: CacheEntry,
}

#[async_trait]
impl CacheStore for StaleReadStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Ok(Some(self.stale.clone()))
    }
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        self.inner.set(key, entry).await
    }
    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.inner.keys(pattern).await
    }
    async fn delete(&self, keys: &[String]) -> Result<usize> {
        self.inner.delete(keys).await
    }
}

async fn memory_cache() -> (Arc<MemoryStore>, Arc<ManualClock>, ResultCache) {
    let store = MemoryStore::new();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = ResultCache::connect_with_clock(store.clone(), clock.clone()).await;
    (store, clock, cache)
}

#[tokio::test]
async fn set_then_get_returns_value() {
    let (_, _, cache) = memory_cache().await;
    assert!(cache.is_enabled());

    let key = ContentKey::tts("ky", "Салам");
    assert_eq!(cache.get(&key).await, None);
    cache.set(&key, b"RIFF....", Duration::from_secs(60)).await;
    assert_eq!(cache.get(&key).await, Some(b"RIFF....".to_vec()));

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.writes, 1);
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let (store, clock, cache) = memory_cache().await;
    let key = ContentKey::qa("ky", 3, "X");
    cache.set(&key, b"answer", Duration::from_secs(3600)).await;

    clock.advance(Duration::from_secs(3599));
    assert!(cache.get(&key).await.is_some());

    clock.advance(Duration::from_secs(2));
    assert_eq!(cache.get(&key).await, None);
    // Reads leave the expired entry for the sweeper
    assert_eq!(store.len(), 1);
    assert_eq!(cache.sweep().await, 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn expired_read_does_not_drop_a_concurrent_write() {
    let inner = MemoryStore::new();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let stale = CacheEntry::new(
        b"old".to_vec(),
        clock.now() - chrono::Duration::hours(2),
        Duration::from_secs(3600),
    );
    let store = Arc::new(StaleReadStore {
        inner: inner.clone(),
        stale,
    });
    let cache = ResultCache::connect_with_clock(store, clock.clone()).await;
    let key = ContentKey::tts("ky", "shared");

    // Another process refreshed the key after our read saw the old entry
    inner
        .set(
            &key.storage_key(),
            CacheEntry::new(b"fresh".to_vec(), clock.now(), Duration::from_secs(3600)),
        )
        .await
        .unwrap();
    assert_eq!(cache.get(&key).await, None);

    let kept = inner.get(&key.storage_key()).await.unwrap().unwrap();
    assert_eq!(kept.value, b"fresh".to_vec());
}

#[tokio::test]
async fn set_overwrites_and_resets_ttl() {
    let (_, clock, cache) = memory_cache().await;
    let key = ContentKey::tts("ru", "привет");
    cache.set(&key, b"one", Duration::from_secs(10)).await;
    clock.advance(Duration::from_secs(8));
    cache.set(&key, b"two", Duration::from_secs(10)).await;
    clock.advance(Duration::from_secs(8));
    assert_eq!(cache.get(&key).await, Some(b"two".to_vec()));
}

#[tokio::test]
async fn unreachable_store_disables_cache() {
    let store = Arc::new(DownStore {
        calls: AtomicUsize::new(0),
    });
    let cache = ResultCache::connect(store.clone()).await;
    assert!(!cache.is_enabled());

    let key = ContentKey::tts("ky", "a");
    cache.set(&key, b"x", Duration::from_secs(60)).await;
    assert_eq!(cache.get(&key).await, None);
    assert_eq!(cache.invalidate("*").await, 0);
    // Disabled cache never touches the store again
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn store_errors_read_as_misses() {
    let cache = ResultCache::connect(Arc::new(FlakyStore)).await;
    assert!(cache.is_enabled());

    let key = ContentKey::tts("ky", "a");
    cache.set(&key, b"x", Duration::from_secs(60)).await;
    assert_eq!(cache.get(&key).await, None);
    assert_eq!(cache.stats().errors, 2);
}

#[tokio::test]
async fn invalidate_by_pattern() {
    let (store, _, cache) = memory_cache().await;
    let ttl = Duration::from_secs(60);
    cache.set(&ContentKey::tts("ky", "a"), b"1", ttl).await;
    cache.set(&ContentKey::tts("ru", "a"), b"2", ttl).await;
    cache.set(&ContentKey::qa("ru", 1, "q"), b"3", ttl).await;

    assert_eq!(cache.invalidate("qa:ru:*").await, 1);
    assert_eq!(cache.invalidate("tts:*").await, 2);
    assert_eq!(cache.invalidate("tts:*").await, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn json_round_trip_and_garbage_reads_as_miss() {
    let (_, _, cache) = memory_cache().await;
    let key = ContentKey::qa("ky", 1, "q");
    cache
        .set_json(&key, &serde_json::json!({"answer": "ok"}), Duration::from_secs(60))
        .await;
    let v: serde_json::Value = cache.get_json(&key).await.unwrap();
    assert_eq!(v["answer"], "ok");

    cache.set(&key, b"\xff not json", Duration::from_secs(60)).await;
    assert!(cache.get_json::<serde_json::Value>(&key).await.is_none());
}

#[tokio::test]
async fn sweep_purges_expired_entries() {
    let (store, clock, cache) = memory_cache().await;
    cache
        .set(&ContentKey::tts("ky", "short"), b"1", Duration::from_secs(5))
        .await;
    cache
        .set(&ContentKey::tts("ky", "long"), b"2", Duration::from_secs(500))
        .await;

    clock.advance(Duration::from_secs(10));
    assert_eq!(cache.sweep().await, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn disabled_cache_has_no_sweeper() {
    let cache = Arc::new(ResultCache::disabled());
    assert!(cache.spawn_sweeper(Duration::from_secs(1)).is_none());
}
