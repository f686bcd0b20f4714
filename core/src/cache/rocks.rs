//! Persistent RocksDB-backed cache store.
//!
//! Each value is framed as `stored_at_ms (i64 LE) | ttl_ms (u64 LE) | payload`
//! so freshness survives restarts. Opening the database is the availability
//! probe: a locked or unreadable path leaves the cache disabled.

use super::{glob_match, CacheEntry, CacheStore};
use crate::{PodiumError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const HEADER_LEN: usize = 16;

pub struct RocksDbCacheStore {
    db: DB,
}

impl RocksDbCacheStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).map_err(|e| PodiumError::CacheUnavailable(e.to_string()))?;

        info!(target = "cache", "RocksDB cache store opened");
        Ok(Arc::new(Self { db }))
    }

    fn encode(entry: &CacheEntry) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + entry.value.len());
        buf.extend_from_slice(&entry.stored_at.timestamp_millis().to_le_bytes());
        buf.extend_from_slice(&(entry.ttl.as_millis() as u64).to_le_bytes());
        buf.extend_from_slice(&entry.value);
        buf
    }

    fn decode(raw: &[u8]) -> Result<CacheEntry> {
        if raw.len() < HEADER_LEN {
            return Err(PodiumError::CacheUnavailable(format!(
                "corrupt cache record ({} bytes)",
                raw.len()
            )));
        }
        let mut ms = [0u8; 8];
        ms.copy_from_slice(&raw[0..8]);
        let mut ttl = [0u8; 8];
        ttl.copy_from_slice(&raw[8..16]);

        let stored_at: DateTime<Utc> = Utc
            .timestamp_millis_opt(i64::from_le_bytes(ms))
            .single()
            .ok_or_else(|| PodiumError::CacheUnavailable("corrupt cache timestamp".into()))?;
        Ok(CacheEntry {
            value: raw[HEADER_LEN..].to_vec(),
            stored_at,
            ttl: Duration::from_millis(u64::from_le_bytes(ttl)),
        })
    }
}

#[async_trait]
impl CacheStore for RocksDbCacheStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.db.get(key) {
            Ok(Some(data)) => Ok(Some(Self::decode(&data)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PodiumError::CacheUnavailable(e.to_string())),
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        self.db
            .put(key, Self::encode(&entry))
            .map_err(|e| PodiumError::CacheUnavailable(e.to_string()))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (k, _) = item.map_err(|e| PodiumError::CacheUnavailable(e.to_string()))?;
            let k = String::from_utf8_lossy(&k).to_string();
            if glob_match(pattern, &k) {
                keys.push(k);
            }
        }
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut batch = WriteBatch::default();
        let mut existing = 0;
        for k in keys {
            let present = self
                .db
                .get(k)
                .map_err(|e| PodiumError::CacheUnavailable(e.to_string()))?
                .is_some();
            if present {
                existing += 1;
                batch.delete(k);
            }
        }
        self.db
            .write(batch)
            .map_err(|e| PodiumError::CacheUnavailable(e.to_string()))?;
        Ok(existing)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut batch = WriteBatch::default();
        let mut purged = 0;
        for item in self.db.iterator(IteratorMode::Start) {
            let (k, v) = item.map_err(|e| PodiumError::CacheUnavailable(e.to_string()))?;
            let expired = match Self::decode(&v) {
                Ok(entry) => entry.is_expired(now),
                Err(_) => true,
            };
            if expired {
                batch.delete(&k);
                purged += 1;
            }
        }
        self.db
            .write(batch)
            .map_err(|e| PodiumError::CacheUnavailable(e.to_string()))?;
        Ok(purged)
    }
}
