//! Result shape for calls that may be answered by degradation.

use bulwark_core::FallbackReason;
use serde::{Deserialize, Serialize};

/// A value plus the path that produced it.
///
/// `fallback_used` is true exactly when `fallback_reason` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guarded<T> {
    pub value: T,
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl<T> Guarded<T> {
    /// Value produced by the live dependency.
    pub fn live(value: T) -> Self {
        Self {
            value,
            fallback_used: false,
            fallback_reason: None,
        }
    }

    /// Value substituted from a degradation table.
    pub fn degraded(value: T, reason: FallbackReason) -> Self {
        Self {
            value,
            fallback_used: true,
            fallback_reason: Some(reason),
        }
    }

    /// Transform the value, keeping the fallback marker.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Guarded<U> {
        Guarded {
            value: f(self.value),
            fallback_used: self.fallback_used,
            fallback_reason: self.fallback_reason,
        }
    }
}
