//! Request and response models
//!
//! Operation payloads parsed from task input, and the bodies the HTTP
//! surface returns.

pub mod requests;
pub mod responses;

pub use requests::{operation_name, CacheRequest, RetryRequest, MAX_KEY_LENGTH};
pub use responses::{ErrorResponse, HealthReport, ResolversResponse, ServiceHealth};
