//! Remote key-value backend (Redis protocol)
//!
//! Uses `redis::aio::ConnectionManager` for multiplexed connections with
//! automatic reconnection. Entries are written with `SET key value EX ttl`
//! so the store expires them natively as well.

use redis::aio::ConnectionManager;
use tracing::debug;

use crate::cache::{CacheEntry, SENTINEL_STORAGE_KEY};
use crate::error::{EngineError, Result};

/// Prefix scoping this engine's keys inside a shared store.
const KEY_PREFIX: &str = "task_resilience:cache:";

const SCAN_BATCH: usize = 100;

// == Remote Backend ==
#[derive(Clone)]
pub struct RemoteBackend {
    connection_manager: ConnectionManager,
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RemoteBackend {
    /// Connects to the store at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            EngineError::Backend(format!("Failed to create remote client: {}", e))
        })?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| EngineError::Backend(format!("Failed to connect to remote store: {}", e)))?;

        debug!(url = %redact_url(url), "Remote cache backend connected");

        Ok(Self { connection_manager })
    }

    pub async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.connection_manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(remote_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| EngineError::Backend(format!("Remote GET failed: {}", e)))?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn store(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let payload = serde_json::to_string(entry)?;

        redis::cmd("SET")
            .arg(remote_key(key))
            .arg(payload)
            .arg("EX")
            .arg(entry.ttl_remaining_secs_ceil())
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| EngineError::Backend(format!("Remote SET failed: {}", e)))?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection_manager.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(remote_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| EngineError::Backend(format!("Remote DEL failed: {}", e)))?;
        Ok(removed > 0)
    }

    pub async fn remove_expired(&self, key: &str, now_ms: u64) -> Result<bool> {
        match self.load(key).await? {
            Some(entry) if entry.is_expired_at(now_ms) => self.remove(key).await,
            _ => Ok(false),
        }
    }

    pub async fn clear(&self) -> Result<u64> {
        let keys = self.scan_keys().await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection_manager.clone();
        let mut removed = 0u64;
        for chunk in keys.chunks(SCAN_BATCH) {
            let count: u64 = redis::cmd("DEL")
                .arg(chunk.to_vec())
                .query_async(&mut conn)
                .await
                .map_err(|e| EngineError::Backend(format!("Remote DEL (batch) failed: {}", e)))?;
            removed += count;
        }
        Ok(removed)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.scan_keys().await?.len())
    }

    /// The store drops keys on its own once their `EX` elapses.
    pub async fn purge_expired(&self, _now_ms: u64) -> Result<usize> {
        Ok(0)
    }

    /// Collects every user key under the prefix with SCAN (never KEYS).
    async fn scan_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.connection_manager.clone();
        let pattern = format!("{}*", KEY_PREFIX);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| EngineError::Backend(format!("Remote SCAN failed: {}", e)))?;

            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        let sentinel = remote_key(SENTINEL_STORAGE_KEY);
        keys.retain(|key| *key != sentinel);
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

fn remote_key(key: &str) -> String {
    format!("{}{}", KEY_PREFIX, key)
}

/// Redact credentials from a connection URL for logging
fn redact_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            // Only a colon after the scheme separator marks a password
            if colon_pos > url.find("://").map(|p| p + 2).unwrap_or(0) {
                return format!("{}***{}", &url[..=colon_pos], &url[at_pos..]);
            }
        }
    }
    url.to_string()
}
