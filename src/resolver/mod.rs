//! Resolver Module
//!
//! Task resolvers over the cache engine and retry orchestrator, and the
//! router that dispatches tasks between them.

mod cache_resolver;
mod retry_resolver;
mod router;
mod task;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::EngineError;
use crate::models::HealthReport;

pub use cache_resolver::CacheResolver;
pub use retry_resolver::RetryResolver;
pub use router::TaskRouter;
pub use task::{ResultStatus, Task, TaskResult, TaskStatus};

// == Resolver Trait ==
#[async_trait]
pub trait Resolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Operation names this resolver accepts.
    fn operations(&self) -> &'static [&'static str];

    /// True when the task names this resolver, or names no resolver and
    /// carries one of [`operations`](Self::operations).
    fn can_handle(&self, task: &Task) -> bool {
        match task.resolver.as_deref() {
            Some(name) => name == self.name(),
            None => task
                .operation()
                .is_some_and(|operation| self.operations().contains(&operation)),
        }
    }

    /// Runs the task. Failures come back as error results, never panics.
    async fn resolve(&self, task: Task) -> TaskResult;

    async fn health(&self) -> HealthReport;
}

/// Completed result, or an error result when the output reports
/// `success: false` or `healthy: false`.
fn settle(task_id: String, output: Value) -> TaskResult {
    if output.get("success") == Some(&json!(false)) {
        let message = output
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("operation failed")
            .to_string();
        return TaskResult::error(task_id, message, output);
    }
    if output.get("healthy") == Some(&json!(false)) {
        let message = output
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("unhealthy")
            .to_string();
        return TaskResult::error(task_id, message, output);
    }
    TaskResult::completed(task_id, output)
}

/// `output_data` for a failed operation: the operation, the subject it
/// acted on (key or target) and the error text.
fn failure_output(operation: Option<&str>, subject: Option<(&str, &str)>, error: &EngineError) -> Value {
    let mut output = Map::new();
    output.insert("success".into(), json!(false));
    if let Some(operation) = operation {
        output.insert("operation".into(), json!(operation));
    }
    if let Some((field, value)) = subject {
        output.insert(field.into(), json!(value));
    }
    let detail = match error {
        EngineError::NotFound(_) => "not found".to_string(),
        other => other.to_string(),
    };
    output.insert("error".into(), json!(detail));
    Value::Object(output)
}
