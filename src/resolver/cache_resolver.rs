//! Cache Resolver
//!
//! Exposes a [`CacheEngine`] as a task resolver.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::CacheEngine;
use crate::error::Result;
use crate::models::{operation_name, CacheRequest, HealthReport};
use crate::resolver::{failure_output, settle, Resolver, Task, TaskResult};

pub struct CacheResolver {
    engine: Arc<CacheEngine>,
}

impl CacheResolver {
    pub const NAME: &'static str = "cache";

    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<CacheEngine> {
        &self.engine
    }

    async fn execute(&self, request: CacheRequest) -> Result<Value> {
        let output = match request {
            CacheRequest::Get { key } => serde_json::to_value(self.engine.get(&key).await?)?,
            CacheRequest::Set { key, value, ttl } => {
                serde_json::to_value(self.engine.set(&key, value, ttl).await?)?
            }
            CacheRequest::Invalidate { key } => {
                self.engine.invalidate(&key).await?;
                json!({ "success": true, "key": key })
            }
            CacheRequest::Clear => {
                let cleared = self.engine.clear().await?;
                json!({ "success": true, "cleared": cleared })
            }
            CacheRequest::GetStats => serde_json::to_value(self.engine.get_stats().await?)?,
            CacheRequest::ClearStats => {
                let previous = self.engine.clear_stats().await;
                json!({ "success": true, "previous": previous })
            }
            CacheRequest::Configure(update) => {
                let changed = self.engine.configure(update).await;
                json!({ "success": true, "changed": changed })
            }
            CacheRequest::Health => serde_json::to_value(self.engine.health().await)?,
        };
        Ok(output)
    }
}

#[async_trait]
impl Resolver for CacheResolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn operations(&self) -> &'static [&'static str] {
        CacheRequest::OPERATIONS
    }

    async fn resolve(&self, task: Task) -> TaskResult {
        let operation = operation_name(&task.input_data).map(str::to_string);
        let key = task
            .input_data
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string);

        let outcome = match CacheRequest::parse(&task.input_data) {
            Ok(request) => self.execute(request).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(output) => {
                debug!(task_id = %task.id, operation = ?operation, "Cache task completed");
                settle(task.id, output)
            }
            Err(err) => {
                warn!(
                    task_id = %task.id,
                    operation = ?operation,
                    key = ?key,
                    error = %err,
                    "Cache task failed"
                );
                let output = failure_output(
                    operation.as_deref(),
                    key.as_deref().map(|key| ("key", key)),
                    &err,
                );
                TaskResult::error(task.id, err.to_string(), output)
            }
        }
    }

    async fn health(&self) -> HealthReport {
        self.engine.health().await
    }
}
