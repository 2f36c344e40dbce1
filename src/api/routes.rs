//! API Routes
//!
//! Configures the Axum router with the task service endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{health_handler, resolvers_handler, task_handler, AppState};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /tasks` - Dispatch a task envelope
/// - `GET /health` - Aggregate resolver health
/// - `GET /resolvers` - Registered resolver names
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tasks", post(task_handler))
        .route("/health", get(health_handler))
        .route("/resolvers", get(resolvers_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
