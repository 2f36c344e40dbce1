//! Expiry Sweeper
//!
//! Background task that periodically purges expired cache entries, so
//! keys that are never read again do not linger in storage.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheEngine;

/// Spawns a background task that calls [`CacheEngine::purge_expired`]
/// every `cleanup_interval_secs` seconds (at least one).
///
/// Returns the handle so the caller can abort the sweeper on shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheEngine::in_memory(300, 1000, InvalidationStrategy::Ttl));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<CacheEngine>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            backend = %cache.backend_kind(),
            "Starting expiry sweeper"
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.purge_expired().await {
                Ok(0) => debug!("Expiry sweep: no expired entries found"),
                Ok(removed) => info!(removed = removed, "Expiry sweep removed expired entries"),
                Err(err) => warn!(error = %err, "Expiry sweep failed"),
            }
        }
    })
}
