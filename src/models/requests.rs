//! Request models for resolver operations
//!
//! Each resolver accepts a closed set of operations, parsed from a task's
//! `input_data` by its `operation` field.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::cache::SettingsUpdate;
use crate::error::{EngineError, Result};
use crate::retry::{BackoffStrategy, RetryCondition, RetryOptions, RetrySettingsUpdate};

/// Maximum allowed logical key length in bytes
pub const MAX_KEY_LENGTH: usize = 1024;

// == Cache Request ==
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum CacheRequest {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: Value,
        /// TTL in seconds; the engine default when absent
        #[serde(default)]
        ttl: Option<u64>,
    },
    Invalidate {
        key: String,
    },
    Clear,
    GetStats,
    ClearStats,
    Configure(SettingsUpdate),
    Health,
}

impl CacheRequest {
    pub const OPERATIONS: &'static [&'static str] = &[
        "get",
        "set",
        "invalidate",
        "clear",
        "get_stats",
        "clear_stats",
        "configure",
        "health",
    ];

    /// Parses and validates `input_data`.
    pub fn parse(input: &Value) -> Result<Self> {
        let request: Self = parse_operation(input, Self::OPERATIONS)?;
        if let Some(error_msg) = request.validate() {
            return Err(EngineError::InvalidRequest(error_msg));
        }
        Ok(request)
    }

    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let key = match self {
            CacheRequest::Get { key }
            | CacheRequest::Set { key, .. }
            | CacheRequest::Invalidate { key } => key,
            _ => return None,
        };
        if key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

// == Retry Request ==
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum RetryRequest {
    Retry {
        /// Name of a registered retry target
        target: String,
        #[serde(default)]
        args: Value,
        #[serde(flatten)]
        options: RetryOptions,
    },
    GetStats,
    ClearStats,
    Configure(RetrySettingsUpdate),
    CalculateDelay {
        attempt: u32,
        #[serde(default)]
        strategy: Option<BackoffStrategy>,
        #[serde(default)]
        base_delay: Option<f64>,
        #[serde(default)]
        max_delay: Option<f64>,
    },
    IsRetriable {
        error: String,
        #[serde(default)]
        condition: Option<RetryCondition>,
    },
    Health,
}

impl RetryRequest {
    pub const OPERATIONS: &'static [&'static str] = &[
        "retry",
        "get_stats",
        "clear_stats",
        "configure",
        "calculate_delay",
        "is_retriable",
        "health",
    ];

    pub fn parse(input: &Value) -> Result<Self> {
        let request: Self = parse_operation(input, Self::OPERATIONS)?;
        if let RetryRequest::Retry { target, .. } = &request {
            if target.is_empty() {
                return Err(EngineError::InvalidRequest(
                    "Target cannot be empty".to_string(),
                ));
            }
        }
        Ok(request)
    }
}

// == Operation Parsing ==
/// The `operation` named by `input`, if it is a string.
pub fn operation_name(input: &Value) -> Option<&str> {
    input.get("operation").and_then(Value::as_str)
}

/// Checks the operation name against `known`, then deserializes.
///
/// A missing name or malformed field is `InvalidRequest`; a name outside
/// `known` is `UnknownOperation`.
fn parse_operation<T: DeserializeOwned>(input: &Value, known: &[&str]) -> Result<T> {
    if !input.is_object() {
        return Err(EngineError::InvalidRequest(
            "input_data must be an object".to_string(),
        ));
    }
    let operation = operation_name(input).ok_or_else(|| {
        EngineError::InvalidRequest("missing required field 'operation'".to_string())
    })?;
    if !known.contains(&operation) {
        return Err(EngineError::UnknownOperation(operation.to_string()));
    }
    serde_json::from_value(input.clone())
        .map_err(|e| EngineError::InvalidRequest(format!("{}: {}", operation, e)))
}
