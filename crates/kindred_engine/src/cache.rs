//! Session cache: a bounded, TTL-expiring accelerator in front of the
//! backing store.
//!
//! Injected as a capability so handlers never reach for ambient state and
//! tests can swap in `NoopCache`. Correctness never depends on it — an
//! expired or evicted entry just means a store read.

use async_trait::async_trait;
use kindred_core::UserRecord;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<UserRecord>;
    async fn put(&self, key: &str, record: UserRecord);
    async fn remove(&self, key: &str);
}

struct CacheEntry {
    record: UserRecord,
    inserted_at: Instant,
}

/// TTL + capacity bounded cache. Eviction is oldest-by-insertion, not by
/// access: an approximate LRU, accepted for its simplicity.
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl TtlCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionCache for TtlCache {
    async fn get(&self, key: &str) -> Option<UserRecord> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                    return Some(entry.record.clone());
                }
                Some(_) => {} // expired: fall through to drop it
                None => return None,
            }
        }
        self.entries.write().await.remove(key);
        None
    }

    async fn put(&self, key: &str, record: UserRecord) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                record,
                inserted_at: Instant::now(),
            },
        );

        if entries.len() > self.capacity {
            // Evict oldest insertions until back under the cap.
            let mut by_age: Vec<(String, Instant)> = entries
                .iter()
                .map(|(k, e)| (k.clone(), e.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, at)| *at);
            let excess = entries.len() - self.capacity;
            for (key, _) in by_age.into_iter().take(excess) {
                entries.remove(&key);
            }
        }
    }

    async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

/// Cache that never holds anything; every read falls through to the store.
pub struct NoopCache;

#[async_trait]
impl SessionCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<UserRecord> {
        None
    }
    async fn put(&self, _key: &str, _record: UserRecord) {}
    async fn remove(&self, _key: &str) {}
}
