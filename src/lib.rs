//! Task Resilience - caching and retry resolvers for a task router
//!
//! A cache engine (memory, file or remote backend, TTL expiry, capacity
//! eviction) and a retry orchestrator (backoff strategies, retriability
//! conditions), both exposed as resolvers over a task envelope.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod resolver;
pub mod retry;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheEngine;
pub use config::Config;
pub use error::{EngineError, Result};
pub use resolver::{Resolver, Task, TaskResult, TaskRouter};
pub use retry::RetryOrchestrator;
pub use tasks::spawn_cleanup_task;
