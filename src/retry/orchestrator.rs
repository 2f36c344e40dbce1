//! Retry Orchestrator Module
//!
//! Runs a caller-supplied operation with bounded retries, backoff between
//! attempts, retriability classification and aggregate statistics.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::models::HealthReport;
use crate::retry::backoff::{calculate_delay, delay_duration};
use crate::retry::condition::{is_retriable, PatternsUpdate};
use crate::retry::{BackoffStrategy, RetryCondition, RetryStats};

/// Predicate consulted for [`RetryCondition::Custom`].
pub type CustomClassifier = Arc<dyn Fn(&str) -> bool + Send + Sync>;

// == Per-Call Options ==
/// Per-call overrides; absent fields use the orchestrator defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetryOptions {
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub strategy: Option<BackoffStrategy>,
    #[serde(default)]
    pub base_delay: Option<f64>,
    #[serde(default)]
    pub max_delay: Option<f64>,
    #[serde(default)]
    pub condition: Option<RetryCondition>,
}

/// Fully resolved policy for one `retry` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
    pub base_delay: f64,
    pub max_delay: f64,
    pub condition: RetryCondition,
}

/// Partial settings for [`RetryOrchestrator::configure`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrySettingsUpdate {
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub base_delay: Option<f64>,
    #[serde(default)]
    pub max_delay: Option<f64>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub retriable_errors: Option<PatternsUpdate>,
}

// == Retry Record ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOutcome {
    Success,
    /// Retriable failures outlasted `max_retries`
    Exhausted,
    /// The condition rejected the failure
    NonRetriable,
    /// The cancellation token fired
    Cancelled,
}

/// What one `retry` call did.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryRecord<T> {
    pub value: Option<T>,
    /// Calls made to the operation, including the first
    pub attempts_made: u32,
    pub last_error: Option<String>,
    pub outcome: RetryOutcome,
}

impl<T> RetryRecord<T> {
    pub fn is_success(&self) -> bool {
        self.outcome == RetryOutcome::Success
    }
}

// == Retry Orchestrator ==
pub struct RetryOrchestrator {
    settings: RwLock<RetryConfig>,
    stats: Mutex<RetryStats>,
    custom: Option<CustomClassifier>,
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("settings", &self.settings)
            .field("custom", &self.custom.as_ref().map(|_| "CustomClassifier"))
            .finish()
    }
}

impl Default for RetryOrchestrator {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryOrchestrator {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            settings: RwLock::new(config),
            stats: Mutex::new(RetryStats::new()),
            custom: None,
        }
    }

    /// Installs the predicate used for the `custom` condition.
    pub fn with_custom_classifier(mut self, classifier: CustomClassifier) -> Self {
        self.custom = Some(classifier);
        self
    }

    pub async fn settings(&self) -> RetryConfig {
        self.settings.read().await.clone()
    }

    /// Fills unset options from the current defaults.
    pub async fn policy(&self, options: &RetryOptions) -> RetryPolicy {
        let defaults = self.settings.read().await;
        RetryPolicy {
            max_retries: options.max_retries.unwrap_or(defaults.max_retries),
            strategy: options.strategy.unwrap_or(defaults.strategy),
            base_delay: options.base_delay.unwrap_or(defaults.base_delay),
            max_delay: options.max_delay.unwrap_or(defaults.max_delay),
            condition: options.condition.unwrap_or(defaults.condition),
        }
    }

    // == Classification ==
    /// Whether `error` should be retried under `condition`.
    pub async fn is_retriable(&self, error: &str, condition: RetryCondition) -> bool {
        if condition == RetryCondition::Custom {
            if let Some(custom) = &self.custom {
                return custom(error);
            }
        }
        let settings = self.settings.read().await;
        is_retriable(error, condition, &settings.retriable_errors)
    }

    /// Delay in seconds before `attempt`, with defaults for unset parts.
    pub async fn calculate_delay(
        &self,
        attempt: u32,
        strategy: Option<BackoffStrategy>,
        base_delay: Option<f64>,
        max_delay: Option<f64>,
    ) -> f64 {
        let defaults = self.settings.read().await;
        calculate_delay(
            attempt,
            strategy.unwrap_or(defaults.strategy),
            base_delay.unwrap_or(defaults.base_delay),
            max_delay.unwrap_or(defaults.max_delay),
        )
    }

    // == Retry ==
    /// Runs `operation` until it succeeds, fails terminally or runs out of
    /// retries.
    pub async fn retry<F, Fut, T, E>(&self, options: RetryOptions, operation: F) -> RetryRecord<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_with_cancel(options, &CancellationToken::new(), operation)
            .await
    }

    /// [`retry`](Self::retry) that stops as soon as `cancel` fires, whether
    /// an attempt is in flight or a backoff is pending.
    pub async fn retry_with_cancel<F, Fut, T, E>(
        &self,
        options: RetryOptions,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> RetryRecord<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let policy = self.policy(&options).await;
        self.stats
            .lock()
            .await
            .record_call(policy.strategy, policy.condition);

        let mut attempts: u32 = 0;
        let mut last_error: Option<String> = None;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = operation() => Some(result),
            };

            let Some(result) = result else {
                return self.cancelled(attempts, last_error).await;
            };

            let message = match result {
                Ok(value) => {
                    let attempts_made = attempts + 1;
                    if attempts > 0 {
                        self.stats.lock().await.record_retry_success(attempts_made);
                        debug!(attempts = attempts_made, "Operation succeeded after retry");
                    }
                    return RetryRecord {
                        value: Some(value),
                        attempts_made,
                        last_error: None,
                        outcome: RetryOutcome::Success,
                    };
                }
                Err(err) => err.to_string(),
            };

            attempts += 1;
            self.stats.lock().await.record_failed_attempt();

            let retriable = self.is_retriable(&message, policy.condition).await;
            if !retriable || attempts > policy.max_retries {
                self.stats.lock().await.record_failure();
                let outcome = if retriable {
                    RetryOutcome::Exhausted
                } else {
                    RetryOutcome::NonRetriable
                };
                warn!(
                    attempts = attempts,
                    condition = %policy.condition,
                    outcome = ?outcome,
                    error = %message,
                    "Retry gave up"
                );
                return RetryRecord {
                    value: None,
                    attempts_made: attempts,
                    last_error: Some(message),
                    outcome,
                };
            }

            let delay = delay_duration(attempts, policy.strategy, policy.base_delay, policy.max_delay);
            debug!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                strategy = %policy.strategy,
                error = %message,
                "Attempt failed, backing off"
            );
            last_error = Some(message);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.cancelled(attempts, last_error).await;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn cancelled<T>(&self, attempts: u32, last_error: Option<String>) -> RetryRecord<T> {
        self.stats.lock().await.record_cancelled();
        info!(attempts = attempts, "Retry cancelled");
        RetryRecord {
            value: None,
            attempts_made: attempts,
            last_error,
            outcome: RetryOutcome::Cancelled,
        }
    }

    // == Stats ==
    pub async fn get_stats(&self) -> RetryStats {
        self.stats.lock().await.clone()
    }

    /// Resets all counters, returning the snapshot taken just before.
    pub async fn clear_stats(&self) -> RetryStats {
        self.stats.lock().await.take()
    }

    // == Configure ==
    /// Applies the present fields and returns the subset that was applied.
    ///
    /// Unknown strategy or condition names and negative delays are ignored.
    pub async fn configure(&self, update: RetrySettingsUpdate) -> Map<String, Value> {
        let mut changed = Map::new();
        let mut settings = self.settings.write().await;

        if let Some(max_retries) = update.max_retries {
            settings.max_retries = max_retries;
            changed.insert("max_retries".into(), json!(max_retries));
        }

        if let Some(raw) = update.strategy {
            match raw.parse::<BackoffStrategy>() {
                Ok(strategy) => {
                    settings.strategy = strategy;
                    changed.insert("strategy".into(), json!(strategy));
                }
                Err(reason) => debug!(reason = %reason, "Ignoring backoff strategy"),
            }
        }

        if let Some(base) = update.base_delay.filter(|d| d.is_finite() && *d >= 0.0) {
            settings.base_delay = base;
            changed.insert("base_delay".into(), json!(base));
        }

        if let Some(max) = update.max_delay.filter(|d| d.is_finite() && *d >= 0.0) {
            settings.max_delay = max;
            changed.insert("max_delay".into(), json!(max));
        }

        if let Some(raw) = update.condition {
            match raw.parse::<RetryCondition>() {
                Ok(condition) => {
                    settings.condition = condition;
                    changed.insert("condition".into(), json!(condition));
                }
                Err(reason) => debug!(reason = %reason, "Ignoring retry condition"),
            }
        }

        if let Some(patterns) = update.retriable_errors {
            settings.retriable_errors.merge(patterns);
            changed.insert("retriable_errors".into(), json!(settings.retriable_errors));
        }

        if !changed.is_empty() {
            info!(changes = ?changed, "Retry orchestrator reconfigured");
        }
        changed
    }

    // == Health ==
    /// Self-check of the policy logic; touches no statistics.
    pub async fn health(&self) -> HealthReport {
        let settings = self.settings().await;
        let delay_ok = calculate_delay(3, BackoffStrategy::Exponential, 1.0, 10.0) == 4.0;
        let classify_ok = is_retriable("", RetryCondition::Always, &settings.retriable_errors);
        let bounds_ok = settings.base_delay >= 0.0 && settings.max_delay >= 0.0;

        if delay_ok && classify_ok && bounds_ok {
            HealthReport::healthy(format!(
                "defaults: {} retries, {} backoff, {} condition",
                settings.max_retries, settings.strategy, settings.condition
            ))
        } else {
            HealthReport::unhealthy(format!(
                "self-check failed (delay={}, classify={}, bounds={})",
                delay_ok, classify_ok, bounds_ok
            ))
        }
    }
}
