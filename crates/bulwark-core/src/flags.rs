//! The closed set of feature flags.
//!
//! Each flag gates the live path of one optional capability. Names are
//! fixed at compile time; free-form flag strings are rejected at parse time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A flag name that is not part of [`FeatureFlag::ALL`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown feature flag: '{0}'")]
pub struct UnknownFlag(pub String);

/// An optional capability that can be switched between its live and degraded path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureFlag {
    /// Use the live generative-AI provider for advice and trend analysis
    #[serde(rename = "FEATURE_AI_ADVISOR")]
    AiAdvisor,

    /// Use live multi-source pricing
    #[serde(rename = "FEATURE_LIVE_PRICING")]
    LivePricing,

    /// Deliver price alerts
    #[serde(rename = "FEATURE_PRICE_ALERTS")]
    PriceAlerts,

    /// Allow trading
    #[serde(rename = "FEATURE_TRADING")]
    Trading,

    /// Serve recommendations
    #[serde(rename = "FEATURE_RECOMMENDATIONS")]
    Recommendations,
}

impl FeatureFlag {
    /// Every flag, in a stable order.
    pub const ALL: [FeatureFlag; 5] = [
        FeatureFlag::AiAdvisor,
        FeatureFlag::LivePricing,
        FeatureFlag::PriceAlerts,
        FeatureFlag::Trading,
        FeatureFlag::Recommendations,
    ];

    /// Flags shed by fallback mode during an incident.
    pub const NON_ESSENTIAL: [FeatureFlag; 3] = [
        FeatureFlag::AiAdvisor,
        FeatureFlag::LivePricing,
        FeatureFlag::Recommendations,
    ];

    /// Canonical name, also the environment variable that seeds the flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureFlag::AiAdvisor => "FEATURE_AI_ADVISOR",
            FeatureFlag::LivePricing => "FEATURE_LIVE_PRICING",
            FeatureFlag::PriceAlerts => "FEATURE_PRICE_ALERTS",
            FeatureFlag::Trading => "FEATURE_TRADING",
            FeatureFlag::Recommendations => "FEATURE_RECOMMENDATIONS",
        }
    }

    /// Human-readable description for status output.
    pub fn description(&self) -> &'static str {
        match self {
            FeatureFlag::AiAdvisor => "Live AI advisor and trend analysis",
            FeatureFlag::LivePricing => "Live multi-source price feeds",
            FeatureFlag::PriceAlerts => "Price alert notifications",
            FeatureFlag::Trading => "Buy and sell order placement",
            FeatureFlag::Recommendations => "Product recommendations",
        }
    }

    /// Whether fallback mode switches this flag off.
    pub fn is_non_essential(&self) -> bool {
        Self::NON_ESSENTIAL.contains(self)
    }
}

impl fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureFlag {
    type Err = UnknownFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownFlag(s.to_string()))
    }
}

/// Interpret a stored or environment flag value. Only the exact string
/// `"true"` enables; anything else, including `"TRUE"` or `" true"`, is off.
pub fn parse_flag_value(raw: &str) -> bool {
    raw == "true"
}

/// Resolved value of every flag, ordered by flag.
pub type FlagSnapshot = BTreeMap<FeatureFlag, bool>;
