//! Task Router
//!
//! Dispatches each task to the first registered resolver that accepts it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::models::HealthReport;
use crate::resolver::{Resolver, Task, TaskResult, TaskStatus};

#[derive(Clone, Default)]
pub struct TaskRouter {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl std::fmt::Debug for TaskRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRouter")
            .field("resolvers", &self.names())
            .finish()
    }
}

impl TaskRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration order is dispatch priority.
    pub fn register(&mut self, resolver: Arc<dyn Resolver>) {
        self.resolvers.push(resolver);
    }

    pub fn with(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.register(resolver);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|resolver| resolver.name()).collect()
    }

    // == Dispatch ==
    /// Resolves `task` on its own tokio task. A resolver panic becomes a
    /// generic error result.
    pub async fn dispatch(&self, mut task: Task) -> TaskResult {
        let Some(resolver) = self
            .resolvers
            .iter()
            .find(|resolver| resolver.can_handle(&task))
            .cloned()
        else {
            let err = EngineError::NoResolver(task.id.clone());
            warn!(
                task_id = %task.id,
                resolver = ?task.resolver,
                operation = ?task.operation(),
                "No resolver accepted task"
            );
            return error_result(task.id, &err);
        };

        let task_id = task.id.clone();
        info!(
            task_id = %task_id,
            resolver = resolver.name(),
            operation = ?task.operation(),
            "Dispatching task"
        );
        task.status = TaskStatus::Running;

        match tokio::spawn(async move { resolver.resolve(task).await }).await {
            Ok(result) => result,
            Err(join_err) => {
                error!(task_id = %task_id, error = %join_err, "Resolver aborted");
                let err = EngineError::Internal("resolver failed unexpectedly".to_string());
                error_result(task_id, &err)
            }
        }
    }

    // == Health ==
    pub async fn health(&self) -> BTreeMap<String, HealthReport> {
        let mut reports = BTreeMap::new();
        for resolver in &self.resolvers {
            reports.insert(resolver.name().to_string(), resolver.health().await);
        }
        reports
    }
}

fn error_result(task_id: String, err: &EngineError) -> TaskResult {
    let message = err.to_string();
    let output = json!({ "success": false, "error": message });
    TaskResult::error(task_id, message, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::cache::{CacheEngine, InvalidationStrategy};
    use crate::resolver::{CacheResolver, ResultStatus, RetryResolver};
    use crate::retry::{RetryOrchestrator, TargetRegistry};

    struct Exploding;

    #[async_trait]
    impl Resolver for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn operations(&self) -> &'static [&'static str] {
            &["explode"]
        }

        async fn resolve(&self, _task: Task) -> TaskResult {
            panic!("resolver blew up");
        }

        async fn health(&self) -> HealthReport {
            HealthReport::unhealthy("always broken")
        }
    }

    fn router() -> TaskRouter {
        let cache = Arc::new(CacheEngine::in_memory(60, 10, InvalidationStrategy::Ttl));
        let orchestrator = Arc::new(RetryOrchestrator::default());
        TaskRouter::new()
            .with(Arc::new(CacheResolver::new(cache)))
            .with(Arc::new(RetryResolver::new(orchestrator, TargetRegistry::new())))
            .with(Arc::new(Exploding))
    }

    fn task(input: Value) -> Task {
        Task::new("t-1", input)
    }

    #[tokio::test]
    async fn test_dispatch_by_operation() {
        let router = router();

        let result = router
            .dispatch(task(json!({"operation": "set", "key": "k", "value": 1})))
            .await;
        assert!(result.is_completed());

        let result = router
            .dispatch(task(json!({"operation": "calculate_delay", "attempt": 2, "strategy": "constant", "base_delay": 2.0})))
            .await;
        assert!(result.is_completed());
        assert_eq!(result.output_data["delay"], 2.0);
    }

    #[tokio::test]
    async fn test_shared_operation_prefers_named_resolver() {
        let router = router();

        let cache_stats = router.dispatch(task(json!({"operation": "get_stats"}))).await;
        assert!(cache_stats.output_data.get("hit_ratio").is_some());

        let retry_stats = router
            .dispatch(task(json!({"operation": "get_stats"})).for_resolver("retry"))
            .await;
        assert!(retry_stats.output_data.get("average_attempts").is_some());
    }

    #[tokio::test]
    async fn test_no_resolver() {
        let router = router();

        let result = router.dispatch(task(json!({"operation": "summarize"}))).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.message.unwrap().contains("t-1"));

        let result = router
            .dispatch(task(json!({"operation": "get"})).for_resolver("llm"))
            .await;
        assert_eq!(result.status, ResultStatus::Error);
    }

    #[tokio::test]
    async fn test_panic_becomes_error_result() {
        let router = router();

        let result = router.dispatch(task(json!({"operation": "explode"}))).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.task_id, "t-1");
        assert_eq!(result.output_data["success"], false);

        // The router keeps working afterwards
        let result = router
            .dispatch(task(json!({"operation": "get", "key": "k"})))
            .await;
        assert!(result.is_completed());
    }

    #[tokio::test]
    async fn test_health_and_names() {
        let router = router();
        assert_eq!(router.names(), vec!["cache", "retry", "exploding"]);

        let reports = router.health().await;
        assert!(reports["cache"].healthy);
        assert!(reports["retry"].healthy);
        assert!(!reports["exploding"].healthy);
    }
}
