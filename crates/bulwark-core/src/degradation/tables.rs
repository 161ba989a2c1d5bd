//! Pre-authored substitute responses.

pub const TREND_1H: &str = "Based on the hourly data, silver is trading within a tight range with moderate volatility. The market shows mixed sentiment with slight bullish pressure. Key resistance at $32.50/oz and support at $31.80/oz. Trading recommendation: Range-bound strategy with careful stops. Risk: Moderate.";

pub const TREND_1D: &str = "Daily analysis shows silver consolidating after a recent uptrend. The price action suggests buyers are in control, but momentum is slowing. Average price: $32.15/oz. Watch for breakout above $32.75/oz for confirmation of bullish continuation. Recommendation: Hold long positions with stops at $31.50/oz. Risk: Low to Moderate.";

pub const TREND_7D: &str = "Weekly chart reveals a strong uptrend with higher highs and higher lows. Silver has broken above the 50-day moving average, indicating bullish sentiment. Price volatility is moderate. Forecast: Continued upside pressure if $31.00/oz holds. Recommendation: Accumulate on dips to $31.50/oz. Risk: Low.";

pub const TREND_30D: &str = "Monthly analysis shows silver in a recovery phase after previous correction. The trend is bullish with increasing trading volume. Key resistance at $33.50/oz, support at $30.00/oz. Economic factors favoring precious metals. Recommendation: Medium-term buy on weakness. Risk: Low to Moderate.";

pub const TREND_1Y: &str = "Annual perspective shows silver trending higher with strong fundamentals. Inflation concerns and geopolitical tensions support prices. The asset has broken above the 200-month moving average. Long-term outlook: BULLISH. Recommendation: Buy and hold for long-term investors. Risk: Low.";

pub const TREND_GENERAL: &str = "Silver remains an attractive precious metal investment. Market factors: central bank policies, USD strength, inflation expectations, and industrial demand. Current sentiment is mixed but leaning bullish. Diversify silver holdings across bars, coins, and ETFs. Always use risk management.";

pub const ADVICE_BUYING: &str = "When buying physical silver, consider: 1) Premium over spot price (typically 10-20% for coins, 5-10% for bars), 2) Dealer reputation and buyback terms, 3) Storage options (home safe, bank vault, or allocated storage), 4) Insurance costs. Recommended: Mix of 999.9 bullion and numismatic coins for diversification.";

pub const ADVICE_INVESTMENT: &str = "Silver offers portfolio diversification, hedge against inflation, and industrial demand support. Consider allocating 5-10% of portfolio to precious metals. Options: Physical silver, silver ETFs, mining stocks, or futures. Balance risk tolerance with growth objectives.";

pub const ADVICE_FORECAST: &str = "Silver price is influenced by: 1) USD strength (inverse relationship), 2) Real interest rates, 3) Inflation expectations, 4) Geopolitical tensions, 5) Industrial demand from electronics/solar. Current sentiment: Moderately bullish. Near-term: $31-33/oz, Medium-term: $33-36/oz target.";

pub const ADVICE_STORAGE: &str = "Physical silver storage options: 1) Home safe ($500-2000) - convenient but insurance expensive, 2) Bank safe deposit box ($20-100/year) - secure but limited access, 3) Allocated storage facility ($3-5 per $1000 value) - professional, insured, best for large amounts.";

pub const ADVICE_TAX: &str = "Silver tax implications vary by location. Generally: 1) Capital gains tax on profits when selling, 2) Physical silver often classified as collectible with special tax rates, 3) Inheritance treated as estate asset. Consult a tax professional for your jurisdiction.";

pub const ADVICE_GENERAL: &str = "Silver is a precious metal with dual nature: 1) Store of value (like gold), 2) Industrial commodity (electronics, solar, medical). Both aspects support long-term demand. Current market sentiment is moderately positive. Diversification with gold recommended.";
