//! Audit records for guarded calls.
//!
//! One record is produced per guarded call and handed to the persistence
//! collaborator. Records are never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a guarded call answered from the degradation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The feature flag for the live path was off
    FlagDisabled,

    /// The circuit breaker refused the call
    BreakerOpen,

    /// The live call ran and failed
    UpstreamFailure,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::FlagDisabled => write!(f, "flag_disabled"),
            FallbackReason::BreakerOpen => write!(f, "breaker_open"),
            FallbackReason::UpstreamFailure => write!(f, "upstream_failure"),
        }
    }
}

/// Record of one guarded call and the path it took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Operation identifier (e.g. "ai.advice")
    pub operation: String,

    /// Summary of the input
    pub input: String,

    /// What the caller received
    pub output: serde_json::Value,

    /// Whether the answer came from degradation
    pub fallback_used: bool,

    /// Which degradation path was taken, absent on the live path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,

    /// Session or request correlation id
    pub correlation_id: String,

    /// When the call completed
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        operation: impl Into<String>,
        input: impl Into<String>,
        output: serde_json::Value,
        fallback_reason: Option<FallbackReason>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            input: input.into(),
            output,
            fallback_used: fallback_reason.is_some(),
            fallback_reason,
            correlation_id: correlation_id.into(),
            created_at: Utc::now(),
        }
    }
}
