//! Cache Engine Module
//!
//! Main cache engine: hashed keys, TTL expiry, capacity eviction and
//! statistics over a swappable storage backend.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::backend::StorageBackend;
use crate::cache::{
    current_timestamp_ms, storage_key, BackendKind, CacheEntry, CacheStats,
    InvalidationStrategy, SENTINEL_STORAGE_KEY,
};
use crate::config::CacheConfig;
use crate::error::{EngineError, Result};
use crate::models::HealthReport;

const HEALTH_SENTINEL_TTL: u64 = 30;

// == Settings ==
/// Runtime-adjustable engine settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSettings {
    pub default_ttl: u64,
    pub max_size: usize,
    pub strategy: InvalidationStrategy,
}

/// Partial settings for [`CacheEngine::configure`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default, alias = "ttl")]
    pub default_ttl: Option<u64>,
    #[serde(default)]
    pub max_size: Option<usize>,
    #[serde(default, alias = "strategy")]
    pub invalidation_strategy: Option<String>,
}

// == Operation Results ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookup {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Expiry as Unix milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Lookup {
    fn miss() -> Self {
        Self {
            found: false,
            value: None,
            expires_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored {
    pub success: bool,
    pub key: String,
    pub expires_at: u64,
}

/// Configured capacity as reported by stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Entries(usize),
    Unlimited,
}

impl Serialize for Capacity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Capacity::Entries(n) => serializer.serialize_u64(*n as u64),
            Capacity::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    pub backend: BackendKind,
    pub size: usize,
    pub max_size: Capacity,
    pub default_ttl: u64,
    pub invalidation_strategy: InvalidationStrategy,
    pub stats: CacheStats,
    pub hit_ratio: f64,
}

// == Cache Engine ==
/// Cache engine shared by concurrent callers.
#[derive(Debug)]
pub struct CacheEngine {
    backend: StorageBackend,
    settings: RwLock<CacheSettings>,
    stats: Mutex<CacheStats>,
    /// Serializes health checks, which share one sentinel key
    health_lock: Mutex<()>,
}

impl CacheEngine {
    // == Constructors ==
    pub fn new(backend: StorageBackend, settings: CacheSettings) -> Self {
        Self {
            backend,
            settings: RwLock::new(settings),
            stats: Mutex::new(CacheStats::new()),
            health_lock: Mutex::new(()),
        }
    }

    /// In-process engine, mostly for tests and embedding.
    pub fn in_memory(default_ttl: u64, max_size: usize, strategy: InvalidationStrategy) -> Self {
        Self::new(
            StorageBackend::Memory(Default::default()),
            CacheSettings {
                default_ttl,
                max_size,
                strategy,
            },
        )
    }

    /// Builds the engine and its backend from configuration.
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend = StorageBackend::from_config(config).await?;
        info!(
            backend = %backend.kind(),
            default_ttl = config.default_ttl,
            max_size = config.max_size,
            strategy = %config.strategy,
            "Cache engine initialized"
        );
        Ok(Self::new(
            backend,
            CacheSettings {
                default_ttl: config.default_ttl,
                max_size: config.max_size,
                strategy: config.strategy,
            },
        ))
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub async fn settings(&self) -> CacheSettings {
        self.settings.read().await.clone()
    }

    // == Get ==
    /// Looks up a logical key.
    ///
    /// Expired entries are reported as misses and deleted from the backend.
    pub async fn get(&self, key: &str) -> Result<Lookup> {
        let skey = storage_key(key);
        let entry = self.backend.load(&skey).await.map_err(|err| {
            warn!(key = key, error = %err, "Cache read failed");
            err
        })?;

        let now = current_timestamp_ms();
        match entry {
            Some(entry) if !entry.is_expired_at(now) => {
                self.stats.lock().await.record_hit();
                debug!(key = key, "Cache HIT");
                Ok(Lookup {
                    found: true,
                    value: Some(entry.value),
                    expires_at: Some(entry.expires_at),
                })
            }
            Some(_) => {
                if let Err(err) = self.backend.remove_expired(&skey, now).await {
                    warn!(key = key, error = %err, "Failed to purge expired entry");
                }
                self.stats.lock().await.record_miss();
                debug!(key = key, "Cache MISS (expired)");
                Ok(Lookup::miss())
            }
            None => {
                self.stats.lock().await.record_miss();
                debug!(key = key, "Cache MISS");
                Ok(Lookup::miss())
            }
        }
    }

    // == Set ==
    /// Stores a value under a logical key for `ttl` seconds (default TTL if None).
    ///
    /// On a full memory backend under the `lru` policy, a new key evicts the
    /// entry with the smallest expiry first.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<u64>) -> Result<Stored> {
        let settings = self.settings().await;
        let entry = CacheEntry::new(value, ttl.unwrap_or(settings.default_ttl));
        let expires_at = entry.expires_at;

        let capacity = match (self.backend.kind(), settings.strategy) {
            (BackendKind::Memory, InvalidationStrategy::Lru) => Some(settings.max_size),
            _ => None,
        };

        let evicted = self
            .backend
            .store(&storage_key(key), entry, capacity)
            .await
            .map_err(|err| {
                warn!(key = key, error = %err, "Cache write failed");
                err
            })?;

        {
            let mut stats = self.stats.lock().await;
            if evicted.is_some() {
                stats.record_eviction();
            }
            stats.record_set();
        }

        debug!(key = key, expires_at = expires_at, "Cache SET");
        Ok(Stored {
            success: true,
            key: key.to_string(),
            expires_at,
        })
    }

    // == Invalidate ==
    /// Removes a logical key. Absent keys yield `EngineError::NotFound`.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        let removed = self.backend.remove(&storage_key(key)).await.map_err(|err| {
            warn!(key = key, error = %err, "Cache invalidate failed");
            err
        })?;

        if !removed {
            return Err(EngineError::NotFound(key.to_string()));
        }

        self.stats.lock().await.record_invalidations(1);
        debug!(key = key, "Cache INVALIDATE");
        Ok(())
    }

    // == Clear ==
    /// Deletes every entry, returning the number removed.
    pub async fn clear(&self) -> Result<u64> {
        let cleared = self.backend.clear().await.map_err(|err| {
            warn!(error = %err, "Cache clear failed");
            err
        })?;

        self.stats.lock().await.record_invalidations(cleared);
        info!(cleared = cleared, "Cache cleared");
        Ok(cleared)
    }

    // == Stats ==
    pub async fn get_stats(&self) -> Result<CacheStatsReport> {
        let size = self.backend.len().await?;
        let settings = self.settings().await;
        let stats = self.stats.lock().await.clone();

        let max_size = match self.backend.kind() {
            BackendKind::Memory => Capacity::Entries(settings.max_size),
            BackendKind::File | BackendKind::Remote => Capacity::Unlimited,
        };

        Ok(CacheStatsReport {
            backend: self.backend.kind(),
            size,
            max_size,
            default_ttl: settings.default_ttl,
            invalidation_strategy: settings.strategy,
            hit_ratio: stats.hit_ratio(),
            stats,
        })
    }

    /// Resets all counters, returning the snapshot taken just before.
    pub async fn clear_stats(&self) -> CacheStats {
        self.stats.lock().await.take()
    }

    // == Configure ==
    /// Applies the present fields and returns the subset that was applied.
    ///
    /// Unknown strategy names and a zero `max_size` are ignored.
    pub async fn configure(&self, update: SettingsUpdate) -> Map<String, Value> {
        let mut changed = Map::new();
        let mut settings = self.settings.write().await;

        if let Some(ttl) = update.default_ttl {
            settings.default_ttl = ttl;
            changed.insert("default_ttl".into(), json!(ttl));
        }

        match update.max_size {
            Some(0) => debug!("Ignoring max_size of zero"),
            Some(max) => {
                settings.max_size = max;
                changed.insert("max_size".into(), json!(max));
            }
            None => {}
        }

        if let Some(raw) = update.invalidation_strategy {
            match raw.parse::<InvalidationStrategy>() {
                Ok(strategy) => {
                    settings.strategy = strategy;
                    changed.insert("invalidation_strategy".into(), json!(strategy));
                }
                Err(reason) => debug!(reason = %reason, "Ignoring invalidation strategy"),
            }
        }

        if !changed.is_empty() {
            info!(changes = ?changed, "Cache engine reconfigured");
        }
        changed
    }

    // == Purge Expired ==
    /// Physically removes every expired entry. Not counted in statistics.
    pub async fn purge_expired(&self) -> Result<usize> {
        self.backend.purge_expired(current_timestamp_ms()).await
    }

    // == Health ==
    /// Writes a sentinel entry, reads it back, compares and deletes it.
    ///
    /// The sentinel lives under a reserved storage key outside the hashed
    /// keyspace, and the check talks to the backend directly: no statistics,
    /// no eviction, no user key touched.
    pub async fn health(&self) -> HealthReport {
        match self.exercise_backend().await {
            Ok(()) => {
                HealthReport::healthy(format!("{} backend round-trip ok", self.backend.kind()))
            }
            Err(err) => {
                warn!(error = %err, "Cache health check failed");
                HealthReport::unhealthy(err.to_string())
            }
        }
    }

    async fn exercise_backend(&self) -> Result<()> {
        let _guard = self.health_lock.lock().await;
        let skey = SENTINEL_STORAGE_KEY;
        let sentinel = json!({ "checked_at": current_timestamp_ms() });
        let expected = serde_json::to_vec(&sentinel)?;

        self.backend
            .store(skey, CacheEntry::new(sentinel, HEALTH_SENTINEL_TTL), None)
            .await?;

        let read = self
            .backend
            .load(skey)
            .await?
            .ok_or_else(|| EngineError::Backend("sentinel entry missing after write".into()))?;
        if serde_json::to_vec(&read.value)? != expected {
            return Err(EngineError::Backend("sentinel value mismatch".into()));
        }

        if !self.backend.remove(skey).await? {
            return Err(EngineError::Backend("sentinel entry missing on delete".into()));
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileBackend;
    use std::time::Duration;

    fn engine(max_size: usize, strategy: InvalidationStrategy) -> CacheEngine {
        CacheEngine::in_memory(300, max_size, strategy)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = engine(100, InvalidationStrategy::Ttl);

        let stored = cache.set("user:1", json!({"name": "a"}), None).await.unwrap();
        assert!(stored.success);
        assert_eq!(stored.key, "user:1");

        let lookup = cache.get("user:1").await.unwrap();
        assert!(lookup.found);
        assert_eq!(lookup.value, Some(json!({"name": "a"})));
        assert_eq!(lookup.expires_at, Some(stored.expires_at));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = engine(100, InvalidationStrategy::Ttl);

        let lookup = cache.get("nonexistent").await.unwrap();
        assert_eq!(lookup, Lookup::miss());
        assert_eq!(cache.get_stats().await.unwrap().stats.misses, 1);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let cache = engine(100, InvalidationStrategy::Ttl);

        cache.set("k", json!("v1"), None).await.unwrap();
        cache.set("k", json!("v2"), None).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().value, Some(json!("v2")));
        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 1);
        assert_eq!(report.stats.sets, 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_and_purged() {
        let cache = engine(100, InvalidationStrategy::Ttl);

        cache.set("short", json!(1), Some(1)).await.unwrap();
        assert!(cache.get("short").await.unwrap().found);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(!cache.get("short").await.unwrap().found);
        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 0);
        assert_eq!(report.stats.hits, 1);
        assert_eq!(report.stats.misses, 1);
    }

    #[tokio::test]
    async fn test_lru_evicts_oldest_expiry() {
        let cache = engine(3, InvalidationStrategy::Lru);

        cache.set("long", json!(1), Some(500)).await.unwrap();
        cache.set("short", json!(2), Some(50)).await.unwrap();
        cache.set("mid", json!(3), Some(200)).await.unwrap();

        // Reading does not protect an entry: eviction follows expiry only
        assert!(cache.get("short").await.unwrap().found);

        cache.set("new", json!(4), Some(100)).await.unwrap();

        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 3);
        assert_eq!(report.stats.evictions, 1);
        assert!(!cache.get("short").await.unwrap().found);
        assert!(cache.get("long").await.unwrap().found);
        assert!(cache.get("new").await.unwrap().found);
    }

    #[tokio::test]
    async fn test_ttl_policy_does_not_enforce_capacity() {
        let cache = engine(2, InvalidationStrategy::Ttl);

        for i in 0..4 {
            cache.set(&format!("k{}", i), json!(i), None).await.unwrap();
        }

        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 4);
        assert_eq!(report.stats.evictions, 0);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = engine(100, InvalidationStrategy::Explicit);

        cache.set("k", json!("v"), None).await.unwrap();
        cache.invalidate("k").await.unwrap();

        assert!(!cache.get("k").await.unwrap().found);
        assert_eq!(cache.get_stats().await.unwrap().stats.invalidations, 1);
    }

    #[tokio::test]
    async fn test_invalidate_missing_leaves_stats_untouched() {
        let cache = engine(100, InvalidationStrategy::Ttl);
        cache.set("other", json!(0), None).await.unwrap();
        let before = cache.get_stats().await.unwrap().stats;

        let result = cache.invalidate("missing").await;

        assert!(matches!(result, Err(EngineError::NotFound(_))));
        assert_eq!(cache.get_stats().await.unwrap().stats, before);
    }

    #[tokio::test]
    async fn test_clear_counts_invalidations() {
        let cache = engine(100, InvalidationStrategy::Ttl);
        for i in 0..3 {
            cache.set(&format!("k{}", i), json!(i), None).await.unwrap();
        }

        assert_eq!(cache.clear().await.unwrap(), 3);

        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 0);
        assert_eq!(report.stats.invalidations, 3);
    }

    #[tokio::test]
    async fn test_stats_report_shape() {
        let cache = engine(10, InvalidationStrategy::Lru);
        cache.set("k", json!(1), None).await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("missing").await.unwrap();

        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.backend, BackendKind::Memory);
        assert_eq!(report.max_size, Capacity::Entries(10));
        assert_eq!(report.hit_ratio, 0.5);

        let encoded = serde_json::to_value(&report).unwrap();
        assert_eq!(encoded["max_size"], json!(10));
        assert_eq!(encoded["backend"], json!("memory"));
        assert_eq!(encoded["stats"]["hits"], json!(1));
    }

    #[tokio::test]
    async fn test_clear_stats_returns_snapshot() {
        let cache = engine(10, InvalidationStrategy::Ttl);
        cache.set("k", json!(1), None).await.unwrap();
        cache.get("k").await.unwrap();

        let snapshot = cache.clear_stats().await;
        assert_eq!(snapshot.sets, 1);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(cache.get_stats().await.unwrap().stats, CacheStats::default());
    }

    #[tokio::test]
    async fn test_configure_applies_present_fields_only() {
        let cache = engine(10, InvalidationStrategy::Ttl);

        let changed = cache
            .configure(SettingsUpdate {
                default_ttl: Some(60),
                max_size: None,
                invalidation_strategy: Some("lru".into()),
            })
            .await;

        assert_eq!(changed.len(), 2);
        assert_eq!(changed["default_ttl"], json!(60));
        assert_eq!(changed["invalidation_strategy"], json!("lru"));
        assert_eq!(
            cache.settings().await,
            CacheSettings {
                default_ttl: 60,
                max_size: 10,
                strategy: InvalidationStrategy::Lru,
            }
        );
    }

    #[tokio::test]
    async fn test_configure_ignores_invalid_strategy() {
        let cache = engine(10, InvalidationStrategy::Ttl);

        let changed = cache
            .configure(SettingsUpdate {
                invalidation_strategy: Some("mru".into()),
                ..Default::default()
            })
            .await;

        assert!(changed.is_empty());
        assert_eq!(cache.settings().await.strategy, InvalidationStrategy::Ttl);
    }

    #[tokio::test]
    async fn test_default_ttl_applies() {
        let cache = CacheEngine::in_memory(60, 10, InvalidationStrategy::Ttl);
        let before = current_timestamp_ms();

        let stored = cache.set("k", json!(1), None).await.unwrap();

        assert!(stored.expires_at >= before + 60_000);
        assert!(stored.expires_at <= current_timestamp_ms() + 60_000);
    }

    #[tokio::test]
    async fn test_health_check_leaves_no_trace() {
        let cache = engine(1, InvalidationStrategy::Lru);
        cache.set("only", json!(1), None).await.unwrap();

        let health = cache.health().await;

        assert!(health.healthy, "{}", health.detail);
        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 1);
        assert_eq!(report.stats.sets, 1);
        assert_eq!(report.stats.evictions, 0);
        assert!(cache.get("only").await.unwrap().found);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = engine(10, InvalidationStrategy::Ttl);
        cache.set("a", json!(1), Some(0)).await.unwrap();
        cache.set("b", json!(2), Some(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.get_stats().await.unwrap().size, 1);
    }

    #[tokio::test]
    async fn test_file_backend_engine() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StorageBackend::File(FileBackend::open(dir.path()).await.unwrap());
        let cache = CacheEngine::new(
            backend,
            CacheSettings {
                default_ttl: 60,
                max_size: 1,
                strategy: InvalidationStrategy::Lru,
            },
        );

        cache.set("a", json!("x"), None).await.unwrap();
        cache.set("b", json!("y"), None).await.unwrap();

        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 2, "file backend ignores capacity");
        assert_eq!(report.max_size, Capacity::Unlimited);
        assert_eq!(cache.get("a").await.unwrap().value, Some(json!("x")));
        assert!(cache.health().await.healthy);
    }

    #[tokio::test]
    async fn test_file_backend_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        let backend = StorageBackend::File(FileBackend::open(&path).await.unwrap());
        let cache = CacheEngine::new(
            backend,
            CacheSettings {
                default_ttl: 60,
                max_size: 10,
                strategy: InvalidationStrategy::Ttl,
            },
        );

        // Pull the directory out from under the backend
        std::fs::remove_dir_all(&path).unwrap();

        let result = cache.set("k", json!(1), None).await;
        assert!(matches!(result, Err(EngineError::Backend(_))));
        assert!(!cache.health().await.healthy);
        assert_eq!(cache.clear_stats().await.sets, 0);
    }

    #[tokio::test]
    async fn test_health_leaves_user_keys_alone() {
        let cache = engine(10, InvalidationStrategy::Ttl);
        cache
            .set("__task_resilience_health__", json!("user data"), None)
            .await
            .unwrap();

        assert!(cache.health().await.healthy);

        let lookup = cache.get("__task_resilience_health__").await.unwrap();
        assert_eq!(lookup.value, Some(json!("user data")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lru_sets_respect_capacity() {
        let cache = std::sync::Arc::new(engine(5, InvalidationStrategy::Lru));

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache.set(&format!("k{}", i), json!(i), None).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 5);
        assert_eq!(report.stats.sets, 200);
        assert_eq!(report.stats.evictions, 195);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_health_during_concurrent_lru_sets() {
        let cache = std::sync::Arc::new(engine(2, InvalidationStrategy::Lru));

        let mut checks = Vec::new();
        let mut writers = Vec::new();
        for i in 0..500 {
            let checker = cache.clone();
            checks.push(tokio::spawn(async move { checker.health().await }));
            let writer = cache.clone();
            writers.push(tokio::spawn(async move {
                writer.set(&format!("k{}", i), json!(i), None).await.unwrap();
            }));
        }

        for check in checks {
            let health = check.await.unwrap();
            assert!(health.healthy, "{}", health.detail);
        }
        for writer in writers {
            writer.await.unwrap();
        }

        let report = cache.get_stats().await.unwrap();
        assert_eq!(report.size, 2);
        assert_eq!(report.stats.sets, 500);
        assert_eq!(report.stats.evictions, 498);
    }
}
