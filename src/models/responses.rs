//! Response models for health checks and the HTTP surface

use std::collections::BTreeMap;

use serde::Serialize;

/// Result of a resolver or engine health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    /// "healthy" or "unhealthy"
    pub status: String,
    pub detail: String,
    /// Check time in RFC 3339 format
    pub timestamp: String,
}

impl HealthReport {
    pub fn healthy(detail: impl Into<String>) -> Self {
        Self::with_status(true, detail.into())
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self::with_status(false, detail.into())
    }

    fn with_status(healthy: bool, detail: String) -> Self {
        Self {
            healthy,
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            detail,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    /// "healthy" only when every resolver is
    pub status: String,
    pub timestamp: String,
    pub resolvers: BTreeMap<String, HealthReport>,
}

impl ServiceHealth {
    pub fn from_reports(resolvers: BTreeMap<String, HealthReport>) -> Self {
        let healthy = resolvers.values().all(|report| report.healthy);
        Self {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            resolvers,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Response body for GET /resolvers
#[derive(Debug, Clone, Serialize)]
pub struct ResolversResponse {
    pub resolvers: Vec<String>,
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
