//! Keyword patterns for degradation lookups.
//!
//! Matching is case-insensitive substring containment, in the order the
//! categories are registered on a table.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // =========================================================================
    // ADVICE TOPICS
    // =========================================================================

    /// Buying or investing questions
    pub static ref BUYING_PATTERN: Regex = Regex::new(r"(?i)buy|purchase|invest").unwrap();

    /// Price direction questions
    pub static ref FORECAST_PATTERN: Regex = Regex::new(r"(?i)price|forecast|trend").unwrap();

    /// Storage questions
    pub static ref STORAGE_PATTERN: Regex = Regex::new(r"(?i)store|keep").unwrap();

    /// Tax questions
    pub static ref TAX_PATTERN: Regex = Regex::new(r"(?i)tax|profit").unwrap();

    // =========================================================================
    // TREND PERIOD ALIASES
    // =========================================================================

    pub static ref HOURLY_PATTERN: Regex = Regex::new(r"(?i)hour").unwrap();
    pub static ref DAILY_PATTERN: Regex = Regex::new(r"(?i)day|daily").unwrap();
    pub static ref WEEKLY_PATTERN: Regex = Regex::new(r"(?i)week").unwrap();
    pub static ref MONTHLY_PATTERN: Regex = Regex::new(r"(?i)month").unwrap();
    pub static ref YEARLY_PATTERN: Regex = Regex::new(r"(?i)year|annual").unwrap();
}
