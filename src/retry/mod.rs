//! Retry Module
//!
//! Bounded retries with selectable backoff and retriability classification.

mod backoff;
mod condition;
mod orchestrator;
mod stats;
mod target;


pub use backoff::{calculate_delay, delay_duration, BackoffStrategy};
pub use condition::{is_retriable, PatternsUpdate, RetriablePatterns, RetryCondition};
pub use orchestrator::{
    CustomClassifier, RetryOptions, RetryOrchestrator, RetryOutcome, RetryPolicy, RetryRecord,
    RetrySettingsUpdate,
};
pub use stats::RetryStats;
pub use target::{CacheLookup, FnTarget, RetryTarget, TargetRegistry};
