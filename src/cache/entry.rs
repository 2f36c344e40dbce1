//! Cache Entry Module
//!
//! Defines individual cache entries, their expiry and the hashed storage key.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

// == Cache Entry ==
/// A stored value and its absolute expiry.
///
/// This is also the on-disk / remote representation: a JSON object holding
/// the opaque value and the expiry timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value, never interpreted by the engine
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry expiring `ttl_seconds` from now.
    pub fn new(value: Value, ttl_seconds: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            expires_at: now.saturating_add(ttl_seconds.saturating_mul(1000)),
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired at `now_ms`.
    ///
    /// An entry is live up to and including its expiry instant; only a
    /// strictly later clock reading expires it.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, zero once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }

    /// Remaining TTL in whole seconds, rounded up, for the remote store's `EX`.
    pub fn ttl_remaining_secs_ceil(&self) -> u64 {
        let ms = self.ttl_remaining_ms();
        ms.div_ceil(1000).max(1)
    }
}

// == Storage Key ==
/// Derives the bounded-length storage key for a logical key.
///
/// The first 128 bits of a SHA-256 digest, hex encoded (32 characters), so
/// the result is safe as a file name and as a remote key.
pub fn storage_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..16])
}

/// Storage key of the health-check sentinel. Not hex, so no logical key
/// hashes to it.
pub const SENTINEL_STORAGE_KEY: &str = "health-sentinel";

/// Whether `key` is reserved for the engine rather than user data.
pub fn is_sentinel(key: &str) -> bool {
    key == SENTINEL_STORAGE_KEY
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
