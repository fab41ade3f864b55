use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{HIGH_VOLUME_THRESHOLD, MIN_ABS_CHANGE_PCT, TOP_MOVERS_CAP};
use crate::fetcher::parse_end_date;
use crate::types::{
    CategoryBucket, Market, MarketSummary, NewsletterData, PipelineConfigSummary, SummaryStats,
};

// ---------------------------------------------------------------------------
// Price-change calculator
// ---------------------------------------------------------------------------

/// Ordered extraction strategies for the current "Yes" price. First success
/// wins; later strategies are never consulted once one yields a value.
const PRICE_STRATEGIES: &[fn(&Market) -> Option<f64>] = &[yes_outcome_price, last_trade_price];

/// Price at the index of the "Yes" label in the aligned outcomePrices /
/// outcomes JSON-encoded arrays.
fn yes_outcome_price(market: &Market) -> Option<f64> {
    let prices: Vec<serde_json::Value> =
        serde_json::from_str(market.outcome_prices.as_deref()?).ok()?;
    let outcomes: Vec<String> = market
        .outcomes
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_else(|| vec!["Yes".to_string(), "No".to_string()]);

    let idx = outcomes.iter().position(|o| o == "Yes")?;
    let raw = prices.get(idx)?;
    raw.as_f64()
        .or_else(|| raw.as_str().and_then(|s| s.parse().ok()))
}

fn last_trade_price(market: &Market) -> Option<f64> {
    market.last_trade_price
}

/// Derive the current/historical "Yes" price pair and percentage delta for
/// each market, using only the one-week price-change window. Every gate is
/// fail-closed: markets missing any required datum are silently excluded.
pub fn calculate_price_changes(markets: &[Market]) -> Vec<Market> {
    let mut with_changes = Vec::new();

    for market in markets {
        // Only binary markets with exactly two outcome tokens are comparable.
        if market.tokens.len() != 2 {
            continue;
        }

        let current = PRICE_STRATEGIES.iter().find_map(|strategy| strategy(market));
        let Some(current_yes_price) = current.filter(|p| *p != 0.0) else {
            continue;
        };

        // The one-week delta is the single supported window; 1-day and
        // 1-month values are carried on the record but never consulted.
        let week_change = match market.one_week_price_change {
            Some(w) if w != 0.0 => w,
            _ => continue,
        };

        let historical = current_yes_price - week_change;
        if historical <= 0.0 {
            debug!(
                "Skipping {}: non-positive historical price {historical:.4}",
                market.condition_id
            );
            continue;
        }

        let price_change_pct = (week_change / historical) * 100.0;
        if price_change_pct.abs() < MIN_ABS_CHANGE_PCT {
            continue;
        }

        let mut enriched = market.clone();
        enriched.current_yes_price = Some(current_yes_price);
        enriched.historical_yes_price = Some(historical);
        enriched.price_change = Some(current_yes_price - historical);
        enriched.price_change_pct = Some(price_change_pct);
        with_changes.push(enriched);
    }

    with_changes
}

// ---------------------------------------------------------------------------
// Significance ranker / bucketizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MarketDataProcessor {
    pub min_volume: f64,
    pub min_change_pct: f64,
    pub max_markets: usize,
    pub hours_analyzed: i64,
}

impl MarketDataProcessor {
    pub fn new(min_volume: f64, min_change_pct: f64, max_markets: usize, hours_analyzed: i64) -> Self {
        Self {
            min_volume,
            min_change_pct,
            max_markets,
            hours_analyzed,
        }
    }

    /// Keep significant moves, order by |change| descending (stable — ties
    /// retain their filtered order), cap to `max_markets`.
    pub fn rank_by_significance(&self, markets: &[Market]) -> Vec<Market> {
        let mut significant: Vec<Market> = markets
            .iter()
            .filter(|m| {
                m.price_change_pct.map(f64::abs).unwrap_or(0.0) >= self.min_change_pct
                    && m.volume >= self.min_volume
            })
            .cloned()
            .collect();

        significant.sort_by(|a, b| {
            let a_mag = a.price_change_pct.map(f64::abs).unwrap_or(0.0);
            let b_mag = b.price_change_pct.map(f64::abs).unwrap_or(0.0);
            b_mag.partial_cmp(&a_mag).unwrap_or(std::cmp::Ordering::Equal)
        });

        significant.truncate(self.max_markets);
        significant
    }

    /// Group summaries by title-cased category, buckets ordered by first
    /// occurrence. Every input appears in exactly one bucket.
    pub fn categorize_markets(&self, markets: &[MarketSummary]) -> Vec<CategoryBucket> {
        let mut buckets: Vec<CategoryBucket> = Vec::new();

        for market in markets {
            match buckets.iter_mut().find(|b| b.category == market.category) {
                Some(bucket) => bucket.markets.push(market.clone()),
                None => buckets.push(CategoryBucket {
                    category: market.category.clone(),
                    markets: vec![market.clone()],
                }),
            }
        }

        buckets
    }

    pub fn format_market_summary(&self, market: &Market) -> MarketSummary {
        let current = market.current_yes_price.unwrap_or(0.0);
        let historical = market.historical_yes_price.unwrap_or(0.0);
        let change_pct = market.price_change_pct.unwrap_or(0.0);

        let (direction, direction_text) = if change_pct > 0.0 {
            ("📈", "increased")
        } else {
            ("📉", "decreased")
        };

        MarketSummary {
            question: if market.question.is_empty() {
                "Unknown".to_string()
            } else {
                market.question.clone()
            },
            category: title_case(if market.category.is_empty() {
                "Other"
            } else {
                &market.category
            }),
            current_price: format!("{:.1}%", current * 100.0),
            previous_price: format!("{:.1}%", historical * 100.0),
            change_pct: format!("{:.1}%", change_pct.abs()),
            direction: direction.to_string(),
            direction_text: direction_text.to_string(),
            volume: format_volume(market.volume),
            market_slug: market.slug.clone(),
            end_date: format_date(market.end_date_iso.as_deref()),
            raw_change: change_pct,
        }
    }

    /// Assemble the structured newsletter object from calculator output.
    pub fn create_newsletter_data(&self, markets: &[Market], now: DateTime<Utc>) -> NewsletterData {
        let top_markets = self.rank_by_significance(markets);
        let formatted: Vec<MarketSummary> = top_markets
            .iter()
            .map(|m| self.format_market_summary(m))
            .collect();

        let by_category = self.categorize_markets(&formatted);

        let avg_change = if formatted.is_empty() {
            0.0
        } else {
            formatted.iter().map(|m| m.raw_change.abs()).sum::<f64>() / formatted.len() as f64
        };

        // Counts cover every gainer/loser; the lists themselves are capped.
        let mut gainers: Vec<MarketSummary> =
            formatted.iter().filter(|m| m.raw_change > 0.0).cloned().collect();
        let mut losers: Vec<MarketSummary> =
            formatted.iter().filter(|m| m.raw_change < 0.0).cloned().collect();
        let gainers_count = gainers.len();
        let losers_count = losers.len();
        gainers.truncate(TOP_MOVERS_CAP);
        losers.truncate(TOP_MOVERS_CAP);

        NewsletterData {
            timestamp: now.format("%Y-%m-%d %H:%M UTC").to_string(),
            summary_stats: SummaryStats {
                total_markets_analyzed: markets.len(),
                significant_moves: formatted.len(),
                avg_change_pct: format!("{avg_change:.1}%"),
                gainers_count,
                losers_count,
            },
            top_markets: formatted,
            gainers,
            losers,
            by_category,
            config: PipelineConfigSummary {
                hours_analyzed: self.hours_analyzed,
                min_volume: format_volume(self.min_volume),
                min_change_threshold: format!("{}%", self.min_change_pct),
            },
        }
    }

    /// Headline observations for the console summary view.
    pub fn generate_market_insights(&self, markets: &[Market]) -> Vec<String> {
        if markets.is_empty() {
            return vec!["No significant market movements detected.".to_string()];
        }

        let mut insights = Vec::new();

        if let Some(biggest) = markets.iter().max_by(|a, b| {
            let a_mag = a.price_change_pct.map(f64::abs).unwrap_or(0.0);
            let b_mag = b.price_change_pct.map(f64::abs).unwrap_or(0.0);
            a_mag.partial_cmp(&b_mag).unwrap_or(std::cmp::Ordering::Equal)
        }) {
            insights.push(format!(
                "The biggest price movement was in '{}' with a {:.1}% change.",
                biggest.question,
                biggest.price_change_pct.map(f64::abs).unwrap_or(0.0),
            ));
        }

        let summaries: Vec<MarketSummary> =
            markets.iter().map(|m| self.format_market_summary(m)).collect();
        let categories = self.categorize_markets(&summaries);
        if categories.len() > 1 {
            if let Some(most_active) = categories.iter().max_by_key(|b| b.markets.len()) {
                insights.push(format!(
                    "The {} category saw the most activity with {} significant moves.",
                    most_active.category,
                    most_active.markets.len(),
                ));
            }
        }

        let high_volume = markets
            .iter()
            .filter(|m| m.volume > HIGH_VOLUME_THRESHOLD)
            .count();
        if high_volume > 0 {
            insights.push(format!(
                "{high_volume} markets with over $100K volume saw significant price changes."
            ));
        }

        insights
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers — presentation only, never fail
// ---------------------------------------------------------------------------

pub fn format_volume(volume: f64) -> String {
    if volume >= 1_000_000.0 {
        format!("${:.1}M", volume / 1_000_000.0)
    } else if volume >= 1_000.0 {
        format!("${:.0}K", volume / 1_000.0)
    } else {
        format!("${volume:.0}")
    }
}

pub fn format_date(date_str: Option<&str>) -> String {
    date_str
        .and_then(parse_end_date)
        .map(|d| d.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
