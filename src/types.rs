use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// One binary-outcome prediction contract, built fresh each pipeline run.
///
/// Field names follow the CLOB wire shape so fallback records deserialize
/// directly; Gamma records are converted into this shape by the fetcher.
/// The camelCase price fields are carried over from Gamma verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Market {
    #[serde(default)]
    pub condition_id: String,
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default, rename = "market_slug")]
    pub slug: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub end_date_iso: Option<String>,
    #[serde(default, deserialize_with = "de_flexible_f64")]
    pub volume: f64,
    #[serde(default)]
    pub tokens: Vec<OutcomeToken>,

    /// JSON-encoded array string aligned with `outcomes`, e.g. `["0.6","0.4"]`.
    #[serde(default, rename = "outcomePrices")]
    pub outcome_prices: Option<String>,
    /// JSON-encoded array string of outcome labels, e.g. `["Yes","No"]`.
    #[serde(default)]
    pub outcomes: Option<String>,
    #[serde(default, rename = "lastTradePrice")]
    pub last_trade_price: Option<f64>,
    #[serde(default, rename = "oneDayPriceChange")]
    pub one_day_price_change: Option<f64>,
    #[serde(default, rename = "oneWeekPriceChange")]
    pub one_week_price_change: Option<f64>,
    #[serde(default, rename = "oneMonthPriceChange")]
    pub one_month_price_change: Option<f64>,

    // Derived by the price-change calculator. None until computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_yes_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_yes_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeToken {
    pub token_id: String,
    pub outcome: String,
}

fn default_category() -> String {
    "Other".to_string()
}

/// Upstream volume fields arrive as either a number or a numeric string.
fn de_flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0.0))
}

// ---------------------------------------------------------------------------
// Newsletter data — the pipeline's output contract
// ---------------------------------------------------------------------------

/// One ranked market formatted for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub question: String,
    pub category: String,
    pub current_price: String,
    pub previous_price: String,
    pub change_pct: String,
    pub direction: String,
    pub direction_text: String,
    pub volume: String,
    pub market_slug: String,
    pub end_date: String,
    /// Signed percentage change, kept numeric for the gainer/loser split.
    pub raw_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_markets_analyzed: usize,
    pub significant_moves: usize,
    pub avg_change_pct: String,
    pub gainers_count: usize,
    pub losers_count: usize,
}

/// Category buckets keep first-occurrence order, so they serialize as an
/// ordered array rather than a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub category: String,
    pub markets: Vec<MarketSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfigSummary {
    pub hours_analyzed: i64,
    pub min_volume: String,
    pub min_change_threshold: String,
}

/// Structured summary consumed by the AI text generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterData {
    pub timestamp: String,
    pub summary_stats: SummaryStats,
    pub top_markets: Vec<MarketSummary>,
    pub gainers: Vec<MarketSummary>,
    pub losers: Vec<MarketSummary>,
    pub by_category: Vec<CategoryBucket>,
    pub config: PipelineConfigSummary,
}
