//! End-to-end scenarios against the engine and orchestrator.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use task_resilience::cache::{CacheEngine, InvalidationStrategy};
use task_resilience::resolver::{CacheResolver, RetryResolver};
use task_resilience::retry::{
    BackoffStrategy, FnTarget, RetryCondition, RetryOptions, RetryOutcome, TargetRegistry,
};
use task_resilience::{RetryOrchestrator, Task, TaskRouter};

#[tokio::test]
async fn test_cache_ttl_scenario() {
    let cache = CacheEngine::in_memory(3600, 1000, InvalidationStrategy::Ttl);

    cache.set("user:1", json!({"name": "a"}), Some(1)).await.unwrap();

    let hit = cache.get("user:1").await.unwrap();
    assert!(hit.found);
    assert_eq!(hit.value, Some(json!({"name": "a"})));

    tokio::time::sleep(Duration::from_secs(2)).await;

    let miss = cache.get("user:1").await.unwrap();
    assert!(!miss.found);

    let report = cache.get_stats().await.unwrap();
    assert_eq!(report.stats.hits, 1);
    assert_eq!(report.stats.misses, 1);
    assert_eq!(report.stats.sets, 1);
    // Purged on the read path
    assert_eq!(report.size, 0);
}

#[tokio::test]
async fn test_retry_server_error_scenario() {
    let orchestrator = RetryOrchestrator::default();
    let calls = AtomicU32::new(0);

    let record = orchestrator
        .retry(
            RetryOptions {
                max_retries: Some(3),
                strategy: Some(BackoffStrategy::Constant),
                base_delay: Some(0.01),
                max_delay: None,
                condition: Some(RetryCondition::Server),
            },
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("503 Service Unavailable".to_string())
                    } else {
                        Ok("payload")
                    }
                }
            },
        )
        .await;

    assert_eq!(record.outcome, RetryOutcome::Success);
    assert_eq!(record.attempts_made, 3);
    assert_eq!(record.value, Some("payload"));

    let stats = orchestrator.get_stats().await;
    assert_eq!(stats.successful_retries, 1);
    assert_eq!(stats.total_attempts, 2);
}

#[tokio::test]
async fn test_lru_capacity_scenario() {
    let cache = CacheEngine::in_memory(3600, 3, InvalidationStrategy::Lru);

    for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
        cache.set(key, json!(i), Some(100 + i as u64)).await.unwrap();
    }

    let report = cache.get_stats().await.unwrap();
    assert_eq!(report.size, 3);
    assert_eq!(report.stats.evictions, 1);
    // "a" had the earliest expiry
    assert!(!cache.get("a").await.unwrap().found);
    assert!(cache.get("d").await.unwrap().found);
}

#[tokio::test]
async fn test_retry_waits_for_cache_population() {
    let cache = Arc::new(CacheEngine::in_memory(60, 100, InvalidationStrategy::Ttl));
    let orchestrator = Arc::new(RetryOrchestrator::default());

    let producer = {
        let cache = cache.clone();
        let calls = Arc::new(AtomicU32::new(0));
        FnTarget(move |args: Value| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                // The second call publishes the value before reading it
                if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                    cache
                        .set("report:7", args, None)
                        .await
                        .map_err(|e| e.to_string())?;
                }
                cache
                    .get("report:7")
                    .await
                    .map_err(|e| e.to_string())?
                    .value
                    .ok_or_else(|| "connection refused".to_string())
            }
        })
    };

    let router = TaskRouter::new()
        .with(Arc::new(CacheResolver::new(cache.clone())))
        .with(Arc::new(RetryResolver::new(
            orchestrator.clone(),
            TargetRegistry::new().with("producer", Arc::new(producer)),
        )));

    let result = router
        .dispatch(Task::new(
            "job-1",
            json!({
                "operation": "retry",
                "target": "producer",
                "args": {"rows": 3},
                "condition": "network",
                "strategy": "linear",
                "base_delay": 0.01
            }),
        ))
        .await;

    assert!(result.is_completed(), "{:?}", result);
    assert_eq!(result.output_data["result"], json!({"rows": 3}));
    assert_eq!(result.output_data["attempts"], 2);

    let stats = router
        .dispatch(Task::new("job-2", json!({"operation": "get_stats"})))
        .await;
    assert_eq!(stats.output_data["stats"]["sets"], 1);
}
