//! In-process memory backend
//!
//! HashMap storage with capacity-bounded inserts. Capacity check, eviction
//! and insert happen under a single write guard so concurrent writers can
//! never push the map past its bound. The health sentinel is held alongside
//! user entries but never counted, evicted or cleared.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{is_sentinel, CacheEntry, SENTINEL_STORAGE_KEY};
use crate::error::Result;

// == Memory Backend ==
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    // == Store ==
    /// Inserts or overwrites an entry.
    ///
    /// When `capacity` is set, the key is new and the map is full, the entry
    /// with the smallest `expires_at` is evicted first. Returns the evicted
    /// storage key, if any.
    pub async fn store(
        &self,
        key: &str,
        entry: CacheEntry,
        capacity: Option<usize>,
    ) -> Result<Option<String>> {
        let mut entries = self.entries.write().await;

        let mut evicted = None;
        if let Some(max) = capacity {
            if !is_sentinel(key) && !entries.contains_key(key) && user_len(&entries) >= max {
                evicted = oldest_expiry(&entries);
                if let Some(victim) = &evicted {
                    entries.remove(victim);
                    debug!(evicted = %victim, "Evicted oldest-expiring entry");
                }
            }
        }

        entries.insert(key.to_string(), entry);
        Ok(evicted)
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    /// Removes the entry only if it is still expired at `now_ms`.
    ///
    /// A concurrent `set` may have replaced the expired entry between the
    /// read and this call; the fresh entry must survive.
    pub async fn remove_expired(&self, key: &str, now_ms: u64) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired_at(now_ms) => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn clear(&self) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let sentinel = entries.remove(SENTINEL_STORAGE_KEY);
        let count = entries.len() as u64;
        entries.clear();
        if let Some(sentinel) = sentinel {
            entries.insert(SENTINEL_STORAGE_KEY.to_string(), sentinel);
        }
        Ok(count)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(user_len(&*self.entries.read().await))
    }

    // == Purge Expired ==
    /// Removes every entry expired at `now_ms`, returning how many went.
    pub async fn purge_expired(&self, now_ms: u64) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now_ms));
        Ok(before - entries.len())
    }
}

/// Number of entries excluding the sentinel.
fn user_len(entries: &HashMap<String, CacheEntry>) -> usize {
    entries.len() - usize::from(entries.contains_key(SENTINEL_STORAGE_KEY))
}

/// Key of the user entry that expires first.
fn oldest_expiry(entries: &HashMap<String, CacheEntry>) -> Option<String> {
    entries
        .iter()
        .filter(|(key, _)| !is_sentinel(key))
        .min_by_key(|(_, entry)| entry.expires_at)
        .map(|(key, _)| key.clone())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(expires_at: u64) -> CacheEntry {
        CacheEntry {
            value: json!(expires_at),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let backend = MemoryBackend::new();
        backend.store("a", entry(100), None).await.unwrap();

        assert_eq!(backend.load("a").await.unwrap(), Some(entry(100)));
        assert_eq!(backend.load("b").await.unwrap(), None);
        assert_eq!(backend.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_smallest_expiry() {
        let backend = MemoryBackend::new();
        backend.store("late", entry(300), Some(2)).await.unwrap();
        backend.store("early", entry(100), Some(2)).await.unwrap();

        let evicted = backend.store("new", entry(200), Some(2)).await.unwrap();

        assert_eq!(evicted.as_deref(), Some("early"));
        assert_eq!(backend.len().await.unwrap(), 2);
        assert!(backend.load("late").await.unwrap().is_some());
        assert!(backend.load("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_at_capacity_does_not_evict() {
        let backend = MemoryBackend::new();
        backend.store("a", entry(100), Some(2)).await.unwrap();
        backend.store("b", entry(200), Some(2)).await.unwrap();

        let evicted = backend.store("a", entry(500), Some(2)).await.unwrap();

        assert!(evicted.is_none());
        assert_eq!(backend.len().await.unwrap(), 2);
        assert_eq!(backend.load("a").await.unwrap(), Some(entry(500)));
    }

    #[tokio::test]
    async fn test_no_capacity_grows_unbounded() {
        let backend = MemoryBackend::new();
        for i in 0..10 {
            let evicted = backend.store(&format!("k{}", i), entry(i), None).await.unwrap();
            assert!(evicted.is_none());
        }
        assert_eq!(backend.len().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_remove_expired_spares_fresh_entry() {
        let backend = MemoryBackend::new();
        backend.store("a", entry(1_000), None).await.unwrap();

        assert!(!backend.remove_expired("a", 500).await.unwrap());
        assert!(backend.remove_expired("a", 1_001).await.unwrap());
        assert!(backend.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_and_clear() {
        let backend = MemoryBackend::new();
        backend.store("old", entry(10), None).await.unwrap();
        backend.store("fresh", entry(10_000), None).await.unwrap();

        assert_eq!(backend.purge_expired(100).await.unwrap(), 1);
        assert_eq!(backend.len().await.unwrap(), 1);

        assert_eq!(backend.clear().await.unwrap(), 1);
        assert_eq!(backend.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let backend = MemoryBackend::new();
        backend.store("a", entry(10), None).await.unwrap();

        assert!(backend.remove("a").await.unwrap());
        assert!(!backend.remove("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_sentinel_is_never_evicted_or_counted() {
        let backend = MemoryBackend::new();
        backend.store(SENTINEL_STORAGE_KEY, entry(1), None).await.unwrap();
        backend.store("a", entry(100), Some(2)).await.unwrap();
        backend.store("b", entry(200), Some(2)).await.unwrap();
        assert_eq!(backend.len().await.unwrap(), 2);

        // The sentinel expires first but the oldest user entry goes
        let evicted = backend.store("c", entry(300), Some(2)).await.unwrap();
        assert_eq!(evicted.as_deref(), Some("a"));
        assert!(backend.load(SENTINEL_STORAGE_KEY).await.unwrap().is_some());

        assert_eq!(backend.clear().await.unwrap(), 2);
        assert_eq!(backend.len().await.unwrap(), 0);
        assert!(backend.load(SENTINEL_STORAGE_KEY).await.unwrap().is_some());
    }
}
