//! Backoff Module
//!
//! Delay computation for the supported backoff strategies.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Backoff Strategy ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base`
    Constant,
    /// `base * a`
    Linear,
    /// `base * 2^(a-1)`
    Exponential,
    /// `base * fib(a)`, `fib(1) = fib(2) = 1`
    Fibonacci,
    /// `base + uniform(0, base * a)`
    Jitter,
}

impl BackoffStrategy {
    pub const ALL: [BackoffStrategy; 5] = [
        BackoffStrategy::Constant,
        BackoffStrategy::Linear,
        BackoffStrategy::Exponential,
        BackoffStrategy::Fibonacci,
        BackoffStrategy::Jitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackoffStrategy::Constant => "constant",
            BackoffStrategy::Linear => "linear",
            BackoffStrategy::Exponential => "exponential",
            BackoffStrategy::Fibonacci => "fibonacci",
            BackoffStrategy::Jitter => "jitter",
        }
    }
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == wanted)
            .ok_or_else(|| format!("unknown backoff strategy '{}'", s.trim()))
    }
}

// == Calculate Delay ==
/// Delay in seconds before `attempt` (1-based), capped at `max_delay`.
///
/// Attempt 0 is treated as attempt 1. Negative or non-finite inputs never
/// produce a negative delay.
pub fn calculate_delay(attempt: u32, strategy: BackoffStrategy, base_delay: f64, max_delay: f64) -> f64 {
    let a = attempt.max(1);
    let base = sanitize(base_delay);
    let cap = sanitize(max_delay);
    if base == 0.0 {
        return 0.0;
    }

    let raw = match strategy {
        BackoffStrategy::Constant => base,
        BackoffStrategy::Linear => base * a as f64,
        BackoffStrategy::Exponential => base * 2f64.powi((a - 1).min(i32::MAX as u32) as i32),
        BackoffStrategy::Fibonacci => base * fibonacci(a),
        BackoffStrategy::Jitter => base + fastrand::f64() * base * a as f64,
    };

    raw.min(cap)
}

/// [`calculate_delay`] as a sleepable duration.
pub fn delay_duration(attempt: u32, strategy: BackoffStrategy, base_delay: f64, max_delay: f64) -> Duration {
    Duration::try_from_secs_f64(calculate_delay(attempt, strategy, base_delay, max_delay))
        .unwrap_or(Duration::MAX)
}

/// `fib(n)` computed iteratively; saturates to infinity for huge `n`.
fn fibonacci(n: u32) -> f64 {
    let (mut prev, mut curr) = (0f64, 1f64);
    for _ in 1..n {
        let next = prev + curr;
        prev = curr;
        curr = next;
        if curr.is_infinite() {
            break;
        }
    }
    curr
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else if seconds == f64::INFINITY {
        f64::MAX
    } else {
        0.0
    }
}
