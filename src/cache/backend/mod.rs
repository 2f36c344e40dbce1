//! Storage backends
//!
//! Enum dispatch over the three backends: in-process map, per-entry files,
//! and a remote key-value store. All keys passed in are already hashed
//! storage keys.

mod file;
mod memory;
mod remote;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use remote::RemoteBackend;

use crate::cache::{BackendKind, CacheEntry};
use crate::config::CacheConfig;
use crate::error::Result;

#[derive(Debug)]
pub enum StorageBackend {
    Memory(MemoryBackend),
    File(FileBackend),
    /// Boxed to keep the enum small
    Remote(Box<RemoteBackend>),
}

impl StorageBackend {
    /// Builds the backend named by the configuration.
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Memory => Ok(Self::Memory(MemoryBackend::new())),
            BackendKind::File => Ok(Self::File(FileBackend::open(&config.cache_dir).await?)),
            BackendKind::Remote => Ok(Self::Remote(Box::new(
                RemoteBackend::connect(&config.redis_url).await?,
            ))),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Memory(_) => BackendKind::Memory,
            Self::File(_) => BackendKind::File,
            Self::Remote(_) => BackendKind::Remote,
        }
    }

    pub async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self {
            Self::Memory(b) => b.load(key).await,
            Self::File(b) => b.load(key).await,
            Self::Remote(b) => b.load(key).await,
        }
    }

    /// Writes an entry. `capacity` only bounds the memory backend; the
    /// returned key is the evicted entry, if any.
    pub async fn store(
        &self,
        key: &str,
        entry: CacheEntry,
        capacity: Option<usize>,
    ) -> Result<Option<String>> {
        match self {
            Self::Memory(b) => b.store(key, entry, capacity).await,
            Self::File(b) => b.store(key, &entry).await.map(|()| None),
            Self::Remote(b) => b.store(key, &entry).await.map(|()| None),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        match self {
            Self::Memory(b) => b.remove(key).await,
            Self::File(b) => b.remove(key).await,
            Self::Remote(b) => b.remove(key).await,
        }
    }

    pub async fn remove_expired(&self, key: &str, now_ms: u64) -> Result<bool> {
        match self {
            Self::Memory(b) => b.remove_expired(key, now_ms).await,
            Self::File(b) => b.remove_expired(key, now_ms).await,
            Self::Remote(b) => b.remove_expired(key, now_ms).await,
        }
    }

    pub async fn clear(&self) -> Result<u64> {
        match self {
            Self::Memory(b) => b.clear().await,
            Self::File(b) => b.clear().await,
            Self::Remote(b) => b.clear().await,
        }
    }

    pub async fn len(&self) -> Result<usize> {
        match self {
            Self::Memory(b) => b.len().await,
            Self::File(b) => b.len().await,
            Self::Remote(b) => b.len().await,
        }
    }

    pub async fn purge_expired(&self, now_ms: u64) -> Result<usize> {
        match self {
            Self::Memory(b) => b.purge_expired(now_ms).await,
            Self::File(b) => b.purge_expired(now_ms).await,
            Self::Remote(b) => b.purge_expired(now_ms).await,
        }
    }
}
