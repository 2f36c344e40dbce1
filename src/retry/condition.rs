//! Retry Condition Module
//!
//! Classifies an error message as retriable under a named condition.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// == Retry Condition ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCondition {
    /// Every failure is retriable
    Always,
    /// Timeouts, matched by pattern
    Timeout,
    /// Connectivity failures, matched by pattern
    Network,
    /// Server-side failures, matched by pattern
    Server,
    /// Caller-supplied predicate; retriable when none is installed
    Custom,
}

impl RetryCondition {
    pub const ALL: [RetryCondition; 5] = [
        RetryCondition::Always,
        RetryCondition::Timeout,
        RetryCondition::Network,
        RetryCondition::Server,
        RetryCondition::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetryCondition::Always => "always",
            RetryCondition::Timeout => "timeout",
            RetryCondition::Network => "network",
            RetryCondition::Server => "server",
            RetryCondition::Custom => "custom",
        }
    }
}

impl fmt::Display for RetryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetryCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|condition| condition.as_str() == wanted)
            .ok_or_else(|| format!("unknown retry condition '{}'", s.trim()))
    }
}

// == Retriable Patterns ==
/// Case-insensitive substrings that make an error retriable per condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetriablePatterns {
    #[serde(default)]
    pub timeout: Vec<String>,
    #[serde(default)]
    pub network: Vec<String>,
    #[serde(default)]
    pub server: Vec<String>,
}

impl Default for RetriablePatterns {
    fn default() -> Self {
        Self {
            timeout: patterns(&["timeout", "timed out", "deadline exceeded"]),
            network: patterns(&["connection", "network", "unreachable", "refused", "reset", "dns"]),
            server: patterns(&[
                "500",
                "502",
                "503",
                "504",
                "internal server error",
                "bad gateway",
                "service unavailable",
                "gateway timeout",
            ]),
        }
    }
}

impl RetriablePatterns {
    /// Patterns for a pattern-matched condition, `None` for the others.
    pub fn for_condition(&self, condition: RetryCondition) -> Option<&[String]> {
        match condition {
            RetryCondition::Timeout => Some(&self.timeout),
            RetryCondition::Network => Some(&self.network),
            RetryCondition::Server => Some(&self.server),
            RetryCondition::Always | RetryCondition::Custom => None,
        }
    }

    /// Replaces the pattern lists present in `update`, lower-casing them.
    pub fn merge(&mut self, update: PatternsUpdate) {
        if let Some(list) = update.timeout {
            self.timeout = lowercase(list);
        }
        if let Some(list) = update.network {
            self.network = lowercase(list);
        }
        if let Some(list) = update.server {
            self.server = lowercase(list);
        }
    }
}

/// Partial pattern replacement used by `configure`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternsUpdate {
    #[serde(default)]
    pub timeout: Option<Vec<String>>,
    #[serde(default)]
    pub network: Option<Vec<String>>,
    #[serde(default)]
    pub server: Option<Vec<String>>,
}

// == Is Retriable ==
/// Pattern-based classification. `custom` is retriable here; a custom
/// predicate, when installed, is consulted by the orchestrator instead.
pub fn is_retriable(error: &str, condition: RetryCondition, patterns: &RetriablePatterns) -> bool {
    match patterns.for_condition(condition) {
        None => true,
        Some(list) => {
            let lowered = error.to_lowercase();
            list.iter().any(|pattern| lowered.contains(&pattern.to_lowercase()))
        }
    }
}

fn patterns(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

fn lowercase(list: Vec<String>) -> Vec<String> {
    list.into_iter().map(|p| p.to_lowercase()).collect()
}
