//! Circuit breaker state and status types.
//!
//! These are the read-only shapes exposed to observability (`/health`,
//! `/status`). The mutable state machine itself lives in `bulwark-runtime`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Normal operation, calls pass through
    Closed,

    /// Dependency deemed unhealthy, calls are rejected immediately
    Open,

    /// Cool-down elapsed, calls are let through to probe for recovery
    HalfOpen,
}

impl BreakerState {
    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and timestamps tracked by a breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerMetrics {
    /// Successful calls since the last transition to CLOSED
    pub success_count: u64,

    /// Failed calls since the last transition to CLOSED
    pub failure_count: u64,

    /// When the most recent failure was recorded
    pub last_failure_time: Option<DateTime<Utc>>,

    /// When the state last changed
    pub state_changed_at: DateTime<Utc>,
}

impl BreakerMetrics {
    /// Zeroed metrics stamped with the given time.
    pub fn zeroed(at: DateTime<Utc>) -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            last_failure_time: None,
            state_changed_at: at,
        }
    }
}

/// Point-in-time snapshot of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    /// Name of the guarded dependency
    pub name: String,

    /// Current state
    pub state: BreakerState,

    /// Current metrics
    pub metrics: BreakerMetrics,
}

impl BreakerStatus {
    /// Whether calls are currently admitted without waiting for a cool-down.
    pub fn is_available(&self) -> bool {
        self.state != BreakerState::Open
    }
}
