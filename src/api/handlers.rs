//! API Handlers
//!
//! HTTP request handlers for the task service endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::CacheEngine;
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::{ResolversResponse, ServiceHealth};
use crate::resolver::{CacheResolver, RetryResolver, Task, TaskResult, TaskRouter};
use crate::retry::{CacheLookup, RetryOrchestrator, TargetRegistry};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<TaskRouter>,
    pub cache: Arc<CacheEngine>,
    pub retry: Arc<RetryOrchestrator>,
}

impl AppState {
    /// Wires the cache and retry resolvers into a router.
    ///
    /// The retry resolver gets the built-in `cache_lookup` target; retries
    /// in flight stop when `cancel` fires.
    pub fn new(cache: Arc<CacheEngine>, retry: Arc<RetryOrchestrator>, cancel: CancellationToken) -> Self {
        let targets =
            TargetRegistry::new().with(CacheLookup::NAME, Arc::new(CacheLookup::new(cache.clone())));

        let router = TaskRouter::new()
            .with(Arc::new(CacheResolver::new(cache.clone())))
            .with(Arc::new(
                RetryResolver::new(retry.clone(), targets).with_cancellation(cancel),
            ));

        Self {
            router: Arc::new(router),
            cache,
            retry,
        }
    }

    /// Builds the cache engine (connecting its backend) and orchestrator
    /// from configuration.
    pub async fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let cache = Arc::new(CacheEngine::from_config(&config.cache).await?);
        let retry = Arc::new(RetryOrchestrator::new(config.retry.clone()));
        Ok(Self::new(cache, retry, cancel))
    }
}

/// Handler for POST /tasks
///
/// Dispatches a task envelope and returns its result. Operation failures
/// come back as a result with `status: "error"`; a malformed envelope is
/// an `InvalidRequest`.
pub async fn task_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Task>, JsonRejection>,
) -> Result<Json<TaskResult>> {
    let Json(task) = payload.map_err(|rejection| EngineError::InvalidRequest(rejection.body_text()))?;
    if task.id.trim().is_empty() {
        return Err(EngineError::InvalidRequest("Task id cannot be empty".to_string()));
    }

    let result = state.router.dispatch(task).await;
    info!(task_id = %result.task_id, status = ?result.status, "Task resolved");
    Ok(Json(result))
}

/// Handler for GET /health
///
/// Aggregates every resolver's health check; 503 when any is unhealthy.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<ServiceHealth>) {
    let health = ServiceHealth::from_reports(state.router.health().await);
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

/// Handler for GET /resolvers
pub async fn resolvers_handler(State(state): State<AppState>) -> Json<ResolversResponse> {
    Json(ResolversResponse {
        resolvers: state
            .router
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InvalidationStrategy;
    use crate::resolver::ResultStatus;
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(CacheEngine::in_memory(300, 100, InvalidationStrategy::Ttl)),
            Arc::new(RetryOrchestrator::default()),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_task_handler_set_and_get() {
        let state = test_state();

        let task = Task::new("t-1", json!({"operation": "set", "key": "k", "value": "v"}));
        let result = task_handler(State(state.clone()), Ok(Json(task))).await.unwrap();
        assert!(result.is_completed());

        let task = Task::new("t-2", json!({"operation": "get", "key": "k"}));
        let result = task_handler(State(state), Ok(Json(task))).await.unwrap();
        assert_eq!(result.task_id, "t-2");
        assert_eq!(result.output_data["value"], "v");
    }

    #[tokio::test]
    async fn test_task_handler_rejects_empty_id() {
        let task = Task::new("  ", json!({"operation": "clear"}));
        let result = task_handler(State(test_state()), Ok(Json(task))).await;
        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_cache_lookup_target_is_registered() {
        let state = test_state();
        state.cache.set("job:1", json!("done"), None).await.unwrap();

        let task = Task::new(
            "t-3",
            json!({"operation": "retry", "target": "cache_lookup", "args": {"key": "job:1"}}),
        );
        let result = task_handler(State(state), Ok(Json(task))).await.unwrap();
        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.output_data["result"], "done");
        assert_eq!(result.output_data["attempts"], 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let (status, Json(health)) = health_handler(State(test_state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, "healthy");
        assert!(health.resolvers.contains_key("cache"));
        assert!(health.resolvers.contains_key("retry"));
    }

    #[tokio::test]
    async fn test_resolvers_handler() {
        let Json(response) = resolvers_handler(State(test_state())).await;
        assert_eq!(response.resolvers, vec!["cache", "retry"]);
    }
}
