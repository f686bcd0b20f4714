//! In-memory cache store.
//!
//! Uses DashMap for concurrent access. Suitable for single-process deployments
//! and tests; entries are lost on restart.

use super::{CacheEntry, CacheStore};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        trace!(target = "cache", key = %key, "memory store set");
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        Ok(keys
            .iter()
            .filter(|k| self.entries.remove(k.as_str()).is_some())
            .count())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}

/// Redis-style glob matching with `*` (any run) and `?` (any single char).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", "tts:ky:abc"));
        assert!(glob_match("tts:*", "tts:ky:abc"));
        assert!(glob_match("qa:ru:*", "qa:ru:0f"));
        assert!(!glob_match("qa:ru:*", "qa:ky:0f"));
        assert!(glob_match("tts:??:*", "tts:ky:abc"));
        assert!(!glob_match("tts:?:*", "tts:ky:abc"));
        assert!(glob_match("*:ky:*", "qa:ky:1"));
        assert!(glob_match("tts:ky:abc", "tts:ky:abc"));
        assert!(!glob_match("tts:ky:ab", "tts:ky:abc"));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .set("a", CacheEntry::new(vec![1], now, Duration::from_secs(10)))
            .await
            .unwrap();
        store
            .set("b", CacheEntry::new(vec![2], now, Duration::from_secs(1000)))
            .await
            .unwrap();

        let later = now + chrono::Duration::seconds(60);
        assert_eq!(store.purge_expired(later).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("b").await.unwrap().is_some());
    }
}
