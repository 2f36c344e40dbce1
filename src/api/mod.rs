//! API Module
//!
//! HTTP surface over the task router.
//!
//! # Endpoints
//! - `POST /tasks` - Dispatch a task to a resolver
//! - `GET /health` - Aggregate health of every resolver
//! - `GET /resolvers` - Names of the registered resolvers

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
