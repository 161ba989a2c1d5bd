//! Prompts for the market advisor.
//!
//! The system prompt is fixed; the user prompt carries the request data.

use bulwark_core::{PriceSummary, TrendPeriod};

/// System prompt shared by every advisor request.
pub const ADVISOR_SYSTEM_PROMPT: &str = r#"
You are a silver market analyst assisting traders and collectors.

Be concise and actionable.
State the trend direction with one of the words bullish, bearish or neutral.
Never present a forecast as certain; mention the main risks.
Prices are in US dollars per troy ounce.
"#;

/// Trend analysis prompt built from price statistics.
pub fn trend_prompt(period: TrendPeriod, summary: &PriceSummary) -> String {
    format!(
        "Analyze the following silver price data for the {period} period:\n\
         - Average Price: ${avg:.2}/oz\n\
         - Highest Price: ${high:.2}/oz\n\
         - Lowest Price: ${low:.2}/oz\n\
         - Samples: {samples}\n\n\
         Provide:\n\
         1. Market trend assessment (bullish/bearish/neutral)\n\
         2. Key price drivers\n\
         3. Trading recommendation\n\
         4. Risk assessment",
        period = period,
        avg = summary.average,
        high = summary.high,
        low = summary.low,
        samples = summary.samples,
    )
}

/// Advice prompt for a free-form question.
pub fn advice_prompt(query: &str) -> String {
    format!(
        "Answer the following question about silver:\n\n\
         Question: {}\n\n\
         Provide practical, accurate advice based on current market knowledge.",
        query.trim()
    )
}
