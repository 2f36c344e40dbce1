//! Cache Module
//!
//! Key-value caching with TTL expiry and capacity eviction over memory,
//! file or remote storage.

mod backend;
mod engine;
mod entry;
mod policy;
mod stats;


// Re-export public types
pub use backend::{FileBackend, MemoryBackend, RemoteBackend, StorageBackend};
pub use engine::{
    CacheEngine, CacheSettings, CacheStatsReport, Capacity, Lookup,
    SettingsUpdate, Stored,
};
pub use entry::{
    current_timestamp_ms, is_sentinel, storage_key, CacheEntry, SENTINEL_STORAGE_KEY,
};
pub use policy::{BackendKind, InvalidationStrategy};
pub use stats::CacheStats;
