//! Graceful degradation tables.
//!
//! When a feature flag disables a live path, or a circuit breaker refuses a
//! call, the caller still gets an answer: a pre-authored substitute chosen by
//! key. Lookup order:
//!
//! 1. Exact key in the table
//! 2. Ordered keyword categories (first match wins)
//! 3. The table's `general` entry
//!
//! Every table is built with a non-empty `general` entry, so resolution is total.

mod patterns;
mod tables;

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

pub use patterns::*;

/// A source of substitute responses.
///
/// Implementations must be pure and total: no I/O, no mutable state, and a
/// non-empty answer for every input (including the empty string).
pub trait DegradationPolicy: Send + Sync {
    /// Pick the substitute response for a topic or period key.
    fn resolve(&self, key: &str) -> &'static str;
}

/// A keyword predicate and the response it selects.
#[derive(Debug)]
pub struct KeywordCategory {
    pattern: &'static Regex,
    response: &'static str,
}

/// Static lookup table implementing [`DegradationPolicy`].
#[derive(Debug)]
pub struct DegradationTable {
    name: &'static str,
    exact: BTreeMap<&'static str, &'static str>,
    categories: Vec<KeywordCategory>,
    general: &'static str,
    fold_case: bool,
}

impl DegradationTable {
    /// Key under which the default response is also reachable by exact match.
    pub const GENERAL_KEY: &'static str = "general";

    /// Create a table whose fall-through answer is `general`.
    pub fn new(name: &'static str, general: &'static str) -> Self {
        debug_assert!(!general.trim().is_empty(), "general response must not be empty");

        let mut exact = BTreeMap::new();
        exact.insert(Self::GENERAL_KEY, general);

        Self {
            name,
            exact,
            categories: Vec::new(),
            general,
            fold_case: false,
        }
    }

    /// Add an exact-match entry.
    pub fn entry(mut self, key: &'static str, response: &'static str) -> Self {
        debug_assert!(!response.trim().is_empty());
        self.exact.insert(key, response);
        self
    }

    /// Add a keyword category, checked after earlier ones.
    pub fn category(mut self, pattern: &'static Regex, response: &'static str) -> Self {
        debug_assert!(!response.trim().is_empty());
        self.categories.push(KeywordCategory { pattern, response });
        self
    }

    /// Match exact keys ignoring ASCII case.
    pub fn case_insensitive_keys(mut self) -> Self {
        self.fold_case = true;
        self
    }

    /// Table name for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Keys reachable by exact match.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.exact.keys().copied()
    }

    /// The fall-through response.
    pub fn general(&self) -> &'static str {
        self.general
    }
}

impl DegradationPolicy for DegradationTable {
    fn resolve(&self, key: &str) -> &'static str {
        if let Some(response) = self.exact.get(key) {
            return *response;
        }
        if self.fold_case {
            let folded = self
                .exact
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key));
            if let Some((_, response)) = folded {
                return *response;
            }
        }

        self.categories
            .iter()
            .find(|category| category.pattern.is_match(key))
            .map(|category| category.response)
            .unwrap_or(self.general)
    }
}

lazy_static! {
    static ref TREND_TABLE: DegradationTable = DegradationTable::new("trend", tables::TREND_GENERAL)
        .case_insensitive_keys()
        .entry("1H", tables::TREND_1H)
        .entry("1D", tables::TREND_1D)
        .entry("7D", tables::TREND_7D)
        .entry("30D", tables::TREND_30D)
        .entry("1Y", tables::TREND_1Y)
        .category(&HOURLY_PATTERN, tables::TREND_1H)
        .category(&DAILY_PATTERN, tables::TREND_1D)
        .category(&WEEKLY_PATTERN, tables::TREND_7D)
        .category(&MONTHLY_PATTERN, tables::TREND_30D)
        .category(&YEARLY_PATTERN, tables::TREND_1Y);

    static ref ADVICE_TABLE: DegradationTable = DegradationTable::new("advice", tables::ADVICE_GENERAL)
        .entry("buying-silver", tables::ADVICE_BUYING)
        .entry("silver-investment", tables::ADVICE_INVESTMENT)
        .entry("price-forecast", tables::ADVICE_FORECAST)
        .entry("storage", tables::ADVICE_STORAGE)
        .entry("tax", tables::ADVICE_TAX)
        .category(&BUYING_PATTERN, tables::ADVICE_BUYING)
        .category(&FORECAST_PATTERN, tables::ADVICE_FORECAST)
        .category(&STORAGE_PATTERN, tables::ADVICE_STORAGE)
        .category(&TAX_PATTERN, tables::ADVICE_TAX);
}

/// Substitute trend analyses, keyed by period (`1H`, `1D`, `7D`, `30D`, `1Y`).
pub fn trends() -> &'static DegradationTable {
    &TREND_TABLE
}

/// Substitute trading advice, keyed by topic or free-form question.
pub fn advice() -> &'static DegradationTable {
    &ADVICE_TABLE
}
