//! Retry Statistics Module
//!
//! Aggregate counters across every retried operation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::retry::{BackoffStrategy, RetryCondition};

// == Retry Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryStats {
    /// Failed attempts across all calls
    pub total_attempts: u64,
    /// Calls that succeeded after at least one retry
    pub successful_retries: u64,
    /// Calls that ended exhausted or non-retriable
    pub failed_retries: u64,
    /// Calls stopped by cancellation
    pub cancelled: u64,
    /// Calls per backoff strategy
    pub strategies: BTreeMap<BackoffStrategy, u64>,
    /// Calls per retriability condition
    pub conditions: BTreeMap<RetryCondition, u64>,
    /// Mean attempts over calls counted in `successful_retries`
    pub average_attempts: f64,
}

impl RetryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one `retry` invocation, whatever its outcome.
    pub fn record_call(&mut self, strategy: BackoffStrategy, condition: RetryCondition) {
        *self.strategies.entry(strategy).or_insert(0) += 1;
        *self.conditions.entry(condition).or_insert(0) += 1;
    }

    pub fn record_failed_attempt(&mut self) {
        self.total_attempts += 1;
    }

    // == Record Success After Retry ==
    /// Counts a success that took `attempts` calls and folds it into the
    /// running average.
    pub fn record_retry_success(&mut self, attempts: u32) {
        self.successful_retries += 1;
        let n = self.successful_retries as f64;
        self.average_attempts = (self.average_attempts * (n - 1.0) + attempts as f64) / n;
    }

    pub fn record_failure(&mut self) {
        self.failed_retries += 1;
    }

    pub fn record_cancelled(&mut self) {
        self.cancelled += 1;
    }

    /// Resets every counter and returns the values held before.
    pub fn take(&mut self) -> RetryStats {
        std::mem::take(self)
    }
}
