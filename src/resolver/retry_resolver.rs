//! Retry Resolver
//!
//! Exposes a [`RetryOrchestrator`] as a task resolver. The `retry`
//! operation runs a registered [`RetryTarget`](crate::retry::RetryTarget)
//! by name.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::models::{operation_name, HealthReport, RetryRequest};
use crate::resolver::{failure_output, settle, Resolver, Task, TaskResult};
use crate::retry::{RetryOptions, RetryOrchestrator, TargetRegistry};

pub struct RetryResolver {
    orchestrator: Arc<RetryOrchestrator>,
    targets: TargetRegistry,
    cancel: CancellationToken,
}

impl RetryResolver {
    pub const NAME: &'static str = "retry";

    pub fn new(orchestrator: Arc<RetryOrchestrator>, targets: TargetRegistry) -> Self {
        Self {
            orchestrator,
            targets,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops in-flight retries when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn orchestrator(&self) -> &Arc<RetryOrchestrator> {
        &self.orchestrator
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    async fn run_target(&self, name: &str, args: Value, options: RetryOptions) -> Result<Value> {
        let target = self
            .targets
            .get(name)
            .ok_or_else(|| EngineError::NotFound(format!("retry target '{}'", name)))?;

        let record = self
            .orchestrator
            .retry_with_cancel(options, &self.cancel, || {
                let target = target.clone();
                let args = args.clone();
                async move { target.invoke(&args).await }
            })
            .await;

        Ok(json!({
            "success": record.is_success(),
            "target": name,
            "result": record.value,
            "attempts": record.attempts_made,
            "error": record.last_error,
            "outcome": record.outcome,
        }))
    }

    async fn execute(&self, request: RetryRequest) -> Result<Value> {
        let output = match request {
            RetryRequest::Retry {
                target,
                args,
                options,
            } => self.run_target(&target, args, options).await?,
            RetryRequest::GetStats => serde_json::to_value(self.orchestrator.get_stats().await)?,
            RetryRequest::ClearStats => {
                let previous = self.orchestrator.clear_stats().await;
                json!({ "success": true, "previous": previous })
            }
            RetryRequest::Configure(update) => {
                let changed = self.orchestrator.configure(update).await;
                json!({ "success": true, "changed": changed })
            }
            RetryRequest::CalculateDelay {
                attempt,
                strategy,
                base_delay,
                max_delay,
            } => {
                let strategy = match strategy {
                    Some(strategy) => strategy,
                    None => self.orchestrator.settings().await.strategy,
                };
                let delay = self
                    .orchestrator
                    .calculate_delay(attempt, Some(strategy), base_delay, max_delay)
                    .await;
                json!({ "attempt": attempt, "strategy": strategy, "delay": delay })
            }
            RetryRequest::IsRetriable { error, condition } => {
                let condition = match condition {
                    Some(condition) => condition,
                    None => self.orchestrator.settings().await.condition,
                };
                let retriable = self.orchestrator.is_retriable(&error, condition).await;
                json!({ "error": error, "condition": condition, "retriable": retriable })
            }
            RetryRequest::Health => serde_json::to_value(self.orchestrator.health().await)?,
        };
        Ok(output)
    }
}

#[async_trait]
impl Resolver for RetryResolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn operations(&self) -> &'static [&'static str] {
        RetryRequest::OPERATIONS
    }

    async fn resolve(&self, task: Task) -> TaskResult {
        let operation = operation_name(&task.input_data).map(str::to_string);
        let target = task
            .input_data
            .get("target")
            .and_then(Value::as_str)
            .map(str::to_string);

        let outcome = match RetryRequest::parse(&task.input_data) {
            Ok(request) => self.execute(request).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(output) => {
                debug!(task_id = %task.id, operation = ?operation, "Retry task finished");
                settle(task.id, output)
            }
            Err(err) => {
                warn!(
                    task_id = %task.id,
                    operation = ?operation,
                    target = ?target,
                    error = %err,
                    "Retry task failed"
                );
                let output = failure_output(
                    operation.as_deref(),
                    target.as_deref().map(|target| ("target", target)),
                    &err,
                );
                TaskResult::error(task.id, err.to_string(), output)
            }
        }
    }

    async fn health(&self) -> HealthReport {
        self.orchestrator.health().await
    }
}
