//! Cache Policy Module
//!
//! Backend selection and invalidation strategy enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// == Backend Kind ==
/// Storage backend behind a cache engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process map, capacity bounded
    Memory,
    /// One file per entry in a directory
    File,
    /// Remote key-value store
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            // "redis" kept as an alias for the remote backend
            "remote" | "redis" => Ok(BackendKind::Remote),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

// == Invalidation Strategy ==
/// How entries leave the cache besides explicit invalidation.
///
/// `Lru` evicts the entry with the smallest `expires_at` when the memory
/// backend is full. That is an oldest-expiry approximation, not access
/// recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationStrategy {
    Ttl,
    Lru,
    Explicit,
}

impl InvalidationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationStrategy::Ttl => "ttl",
            InvalidationStrategy::Lru => "lru",
            InvalidationStrategy::Explicit => "explicit",
        }
    }
}

impl fmt::Display for InvalidationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ttl" => Ok(InvalidationStrategy::Ttl),
            "lru" => Ok(InvalidationStrategy::Lru),
            "explicit" => Ok(InvalidationStrategy::Explicit),
            other => Err(format!("unknown invalidation strategy '{}'", other)),
        }
    }
}
