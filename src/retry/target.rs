//! Retry Targets
//!
//! Named operations the retry resolver can run on behalf of a task. A task
//! envelope cannot carry a closure, so callers register targets up front
//! and tasks refer to them by name.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::CacheEngine;

// == Retry Target ==
#[async_trait]
pub trait RetryTarget: Send + Sync {
    /// One attempt. The error string is what retriability is judged on.
    async fn invoke(&self, args: &Value) -> Result<Value, String>;
}

/// Adapts an async closure into a [`RetryTarget`].
pub struct FnTarget<F>(pub F);

#[async_trait]
impl<F, Fut> RetryTarget for FnTarget<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, String>> + Send,
{
    async fn invoke(&self, args: &Value) -> Result<Value, String> {
        (self.0)(args.clone()).await
    }
}

// == Cache Lookup Target ==
/// Reads `args.key` from a cache engine, failing on a miss.
///
/// Lets a caller wait for a value another task is expected to populate.
pub struct CacheLookup {
    cache: Arc<CacheEngine>,
}

impl CacheLookup {
    pub const NAME: &'static str = "cache_lookup";

    pub fn new(cache: Arc<CacheEngine>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl RetryTarget for CacheLookup {
    async fn invoke(&self, args: &Value) -> Result<Value, String> {
        let key = args
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required field 'key'".to_string())?;

        let lookup = self.cache.get(key).await.map_err(|e| e.to_string())?;
        match lookup.value {
            Some(value) if lookup.found => Ok(value),
            _ => Err(format!("key not found: {}", key)),
        }
    }
}

// == Target Registry ==
#[derive(Default, Clone)]
pub struct TargetRegistry {
    targets: BTreeMap<String, Arc<dyn RetryTarget>>,
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("targets", &self.names())
            .finish()
    }
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a target under `name`.
    pub fn register(&mut self, name: impl Into<String>, target: Arc<dyn RetryTarget>) {
        self.targets.insert(name.into(), target);
    }

    pub fn with(mut self, name: impl Into<String>, target: Arc<dyn RetryTarget>) -> Self {
        self.register(name, target);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RetryTarget>> {
        self.targets.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }
}
