//! Price series helpers for trend analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A period name outside the supported set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported trend period: '{0}' (expected one of 1H, 1D, 7D, 30D, 1Y)")]
pub struct UnknownPeriod(pub String);

/// Analysis window for a trend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendPeriod {
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "7D")]
    SevenDays,
    #[serde(rename = "30D")]
    ThirtyDays,
    #[serde(rename = "1Y")]
    OneYear,
}

impl TrendPeriod {
    pub const ALL: [TrendPeriod; 5] = [
        TrendPeriod::OneHour,
        TrendPeriod::OneDay,
        TrendPeriod::SevenDays,
        TrendPeriod::ThirtyDays,
        TrendPeriod::OneYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendPeriod::OneHour => "1H",
            TrendPeriod::OneDay => "1D",
            TrendPeriod::SevenDays => "7D",
            TrendPeriod::ThirtyDays => "30D",
            TrendPeriod::OneYear => "1Y",
        }
    }
}

impl fmt::Display for TrendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendPeriod {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPeriod(s.to_string()))
    }
}

/// Average, high and low of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub average: f64,
    pub high: f64,
    pub low: f64,
    pub samples: usize,
}

impl PriceSummary {
    /// Summarize a series. Returns `None` for an empty series.
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        if prices.is_empty() {
            return None;
        }

        // Dividing before summing keeps the mean finite for finite inputs
        let count = prices.len() as f64;
        let average: f64 = prices.iter().map(|p| p / count).sum();
        let high = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let low = prices.iter().copied().fold(f64::INFINITY, f64::min);

        Some(Self {
            average,
            high,
            low,
            samples: prices.len(),
        })
    }
}

/// Direction read out of an analysis text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    /// Classify free text by its bullish/bearish vocabulary.
    pub fn from_analysis(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("bullish") || lower.contains("upward") {
            TrendDirection::Up
        } else if lower.contains("bearish") || lower.contains("downward") {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        }
    }
}

/// Structured output of a live trend analysis, persisted as a side effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub period: TrendPeriod,
    pub direction: TrendDirection,
    pub average_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub analysis: String,
    pub generated_at: DateTime<Utc>,
}

impl TrendRecord {
    pub fn new(period: TrendPeriod, summary: &PriceSummary, analysis: impl Into<String>) -> Self {
        let analysis = analysis.into();
        Self {
            period,
            direction: TrendDirection::from_analysis(&analysis),
            average_price: summary.average,
            high_price: summary.high,
            low_price: summary.low,
            analysis,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_series() {
        let summary = PriceSummary::from_prices(&[31.5, 32.0, 31.8, 32.5]).unwrap();
        assert!((summary.average - 31.95).abs() < 1e-9);
        assert_eq!(summary.high, 32.5);
        assert_eq!(summary.low, 31.5);
        assert_eq!(summary.samples, 4);
    }

    #[test]
    fn test_average_of_huge_prices_stays_finite() {
        let summary = PriceSummary::from_prices(&[f64::MAX, f64::MAX, f64::MAX]).unwrap();
        assert!(summary.average.is_finite());
        assert!(summary.average > f64::MAX * 0.99);
    }

    #[test]
    fn test_empty_series_has_no_summary() {
        assert!(PriceSummary::from_prices(&[]).is_none());
    }

    #[test]
    fn test_direction_from_text() {
        assert_eq!(TrendDirection::from_analysis("Outlook: BULLISH"), TrendDirection::Up);
        assert_eq!(
            TrendDirection::from_analysis("a downward channel"),
            TrendDirection::Down
        );
        assert_eq!(TrendDirection::from_analysis("sideways"), TrendDirection::Stable);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("30d".parse::<TrendPeriod>().unwrap(), TrendPeriod::ThirtyDays);
        assert_eq!(TrendPeriod::OneYear.to_string(), "1Y");
        assert!("2W".parse::<TrendPeriod>().is_err());
    }

    #[test]
    fn test_trend_record_extracts_direction() {
        let summary = PriceSummary::from_prices(&[30.0, 33.0]).unwrap();
        let record = TrendRecord::new(TrendPeriod::OneDay, &summary, "Bearish pressure");
        assert_eq!(record.direction, TrendDirection::Down);
        assert_eq!(record.high_price, 33.0);
    }
}
