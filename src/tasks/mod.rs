//! Background Tasks Module
//!
//! Tasks that run periodically while the service is up.
//!
//! # Tasks
//! - Expiry sweeper: purges expired cache entries at the configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
