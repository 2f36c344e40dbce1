//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::{BackendKind, InvalidationStrategy};
use crate::retry::{BackoffStrategy, RetriablePatterns, RetryCondition};

/// Top-level configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Cache engine settings
    pub cache: CacheConfig,
    /// Retry orchestrator settings
    pub retry: RetryConfig,
}

/// Cache engine settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Storage backend
    pub backend: BackendKind,
    /// Directory used by the file backend
    pub cache_dir: PathBuf,
    /// Connection string used by the remote backend
    pub redis_url: String,
    /// TTL in seconds for entries set without one
    pub default_ttl: u64,
    /// Capacity of the memory backend
    pub max_size: usize,
    /// Eviction / invalidation policy
    pub strategy: InvalidationStrategy,
}

/// Retry orchestrator defaults, used when a call leaves a field unset.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
    /// Base delay in seconds
    pub base_delay: f64,
    /// Delay cap in seconds
    pub max_delay: f64,
    pub condition: RetryCondition,
    /// Substring patterns per named condition
    pub retriable_errors: RetriablePatterns,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 1)
    /// - `CACHE_BACKEND` - `memory`, `file` or `remote` (default: memory)
    /// - `CACHE_DIR` - File backend directory (default: ./cache)
    /// - `CACHE_REDIS_URL` - Remote backend URL (default: redis://127.0.0.1:6379)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `CACHE_MAX_SIZE` - Memory backend capacity (default: 1000)
    /// - `CACHE_POLICY` - `ttl`, `lru` or `explicit` (default: ttl)
    /// - `RETRY_MAX_RETRIES` - (default: 3)
    /// - `RETRY_STRATEGY` - (default: exponential)
    /// - `RETRY_BASE_DELAY` - seconds (default: 1.0)
    /// - `RETRY_MAX_DELAY` - seconds (default: 60.0)
    /// - `RETRY_CONDITION` - (default: always)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            cache: CacheConfig {
                backend: env_or("CACHE_BACKEND", defaults.cache.backend),
                cache_dir: env_or("CACHE_DIR", defaults.cache.cache_dir),
                redis_url: env_or("CACHE_REDIS_URL", defaults.cache.redis_url),
                default_ttl: env_or("CACHE_DEFAULT_TTL", defaults.cache.default_ttl),
                max_size: env_or("CACHE_MAX_SIZE", defaults.cache.max_size),
                strategy: env_or("CACHE_POLICY", defaults.cache.strategy),
            },
            retry: RetryConfig {
                max_retries: env_or("RETRY_MAX_RETRIES", defaults.retry.max_retries),
                strategy: env_or("RETRY_STRATEGY", defaults.retry.strategy),
                base_delay: env_or("RETRY_BASE_DELAY", defaults.retry.base_delay),
                max_delay: env_or("RETRY_MAX_DELAY", defaults.retry.max_delay),
                condition: env_or("RETRY_CONDITION", defaults.retry.condition),
                retriable_errors: defaults.retry.retriable_errors,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 1,
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            cache_dir: PathBuf::from("./cache"),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            default_ttl: 3600,
            max_size: 1000,
            strategy: InvalidationStrategy::Ttl,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            strategy: BackoffStrategy::Exponential,
            base_delay: 1.0,
            max_delay: 60.0,
            condition: RetryCondition::Always,
            retriable_errors: RetriablePatterns::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cleanup_interval, 1);
        assert_eq!(config.cache.backend, BackendKind::Memory);
        assert_eq!(config.cache.default_ttl, 3600);
        assert_eq!(config.cache.max_size, 1000);
        assert_eq!(config.cache.strategy, InvalidationStrategy::Ttl);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.strategy, BackoffStrategy::Exponential);
        assert_eq!(config.retry.condition, RetryCondition::Always);
    }

    #[test]
    fn test_env_or_parses_and_falls_back() {
        env::set_var("TASK_RESILIENCE_TEST_PORT", "8080");
        env::set_var("TASK_RESILIENCE_TEST_POLICY", "lru");
        env::set_var("TASK_RESILIENCE_TEST_BAD", "not-a-number");

        assert_eq!(env_or("TASK_RESILIENCE_TEST_PORT", 1u16), 8080);
        assert_eq!(
            env_or("TASK_RESILIENCE_TEST_POLICY", InvalidationStrategy::Ttl),
            InvalidationStrategy::Lru
        );
        assert_eq!(env_or("TASK_RESILIENCE_TEST_BAD", 7u64), 7);
        assert_eq!(env_or("TASK_RESILIENCE_TEST_UNSET", 9u64), 9);

        env::remove_var("TASK_RESILIENCE_TEST_PORT");
        env::remove_var("TASK_RESILIENCE_TEST_POLICY");
        env::remove_var("TASK_RESILIENCE_TEST_BAD");
    }
}
