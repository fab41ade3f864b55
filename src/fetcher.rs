use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{Config, CLOB_END_CURSOR, DAILY_CUTOFF_HOURS, FETCH_PAGE_SIZE, GAMMA_MIN_VOLUME};
use crate::error::Result;
use crate::types::{Market, OutcomeToken};

#[derive(Debug, Default)]
pub struct FilterStats {
    pub input: usize,
    /// Markets flagged active upstream — diagnostic only, never used to drop.
    pub active: usize,
    /// Markets not flagged closed upstream — diagnostic only.
    pub not_closed: usize,
    /// Markets ending more than 48h out (or with unparseable end dates).
    pub future_end: usize,
    pub kept: usize,
}

/// Fetch all active markets, Gamma first with offset pagination, falling back
/// entirely to the CLOB cursor endpoint if Gamma errors. `limit` caps the
/// total and short-circuits further pages.
pub async fn get_all_markets(cfg: &Config, limit: Option<usize>) -> Result<Vec<Market>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    match fetch_gamma_markets(&client, cfg, limit).await {
        Ok(markets) => Ok(markets),
        Err(e) => {
            warn!("Gamma fetch failed: {e} — falling back to CLOB API");
            Ok(fetch_clob_markets(&client, cfg, limit).await)
        }
    }
}

/// Primary source: Gamma `/markets`, page size 100, server-side filtered to
/// active/open markets above a small volume floor. Any transport or HTTP
/// error aborts the whole Gamma path (the caller falls back to CLOB).
async fn fetch_gamma_markets(
    client: &reqwest::Client,
    cfg: &Config,
    limit: Option<usize>,
) -> Result<Vec<Market>> {
    let url = format!("{}/markets", cfg.gamma_api_url);
    let mut all_markets = Vec::new();
    let mut offset = 0usize;

    loop {
        // Parsed as a list directly: a 200 with a non-array body (e.g. an
        // error object) is a parse failure, which aborts the Gamma path and
        // lets the caller fall back to CLOB.
        let items: Vec<serde_json::Value> = client
            .get(&url)
            .query(&[
                ("active", "true".to_string()),
                ("closed", "false".to_string()),
                ("volume_num_min", format!("{GAMMA_MIN_VOLUME:.0}")),
                ("limit", FETCH_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if items.is_empty() {
            break;
        }
        let page_len = items.len();

        for item in &items {
            all_markets.push(parse_gamma_market(item));
            if let Some(lim) = limit {
                if all_markets.len() >= lim {
                    all_markets.truncate(lim);
                    return Ok(all_markets);
                }
            }
        }

        if page_len < FETCH_PAGE_SIZE {
            break;
        }
        offset += FETCH_PAGE_SIZE;
    }

    Ok(all_markets)
}

/// Fallback source: CLOB cursor pagination. Records arrive already in the
/// internal shape; malformed records are skipped. A transport error mid-way
/// returns whatever was accumulated — partial results, not an error.
async fn fetch_clob_markets(
    client: &reqwest::Client,
    cfg: &Config,
    limit: Option<usize>,
) -> Vec<Market> {
    let url = format!("{}/markets", cfg.clob_api_url);
    let mut all_markets: Vec<Market> = Vec::new();
    let mut next_cursor = String::new();

    loop {
        let mut req = client.get(&url);
        if !next_cursor.is_empty() && next_cursor != CLOB_END_CURSOR {
            req = req.query(&[("next_cursor", next_cursor.as_str())]);
        }

        let resp: serde_json::Value = match req.send().await {
            Ok(r) => match r.error_for_status() {
                Ok(r) => match r.json().await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("CLOB response parse error: {e}");
                        break;
                    }
                },
                Err(e) => {
                    warn!("CLOB HTTP error: {e}");
                    break;
                }
            },
            Err(e) => {
                warn!("CLOB fetch error: {e}");
                break;
            }
        };

        let items = resp
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();
        for item in items {
            match serde_json::from_value::<Market>(item) {
                Ok(m) => all_markets.push(m),
                Err(e) => debug!("Skipping malformed CLOB record: {e}"),
            }
        }

        if let Some(lim) = limit {
            if all_markets.len() >= lim {
                all_markets.truncate(lim);
                break;
            }
        }

        next_cursor = resp
            .get("next_cursor")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();
        if next_cursor.is_empty() || next_cursor == CLOB_END_CURSOR {
            break;
        }
    }

    all_markets
}

/// Convert a raw Gamma record into the internal Market shape. Never rejects
/// the record: token pairing is skipped (left empty) if `clobTokenIds` or
/// `outcomes` fail to parse, and downstream filters drop what they must.
pub fn parse_gamma_market(v: &serde_json::Value) -> Market {
    Market {
        condition_id: str_field(v, "conditionId"),
        question_id: str_field(v, "questionID"),
        question: str_field(v, "question"),
        slug: str_field(v, "slug"),
        category: v
            .get("category")
            .and_then(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .unwrap_or("Other")
            .to_string(),
        active: v.get("active").and_then(|b| b.as_bool()).unwrap_or(true),
        closed: v.get("closed").and_then(|b| b.as_bool()).unwrap_or(false),
        end_date_iso: v.get("endDate").and_then(|e| e.as_str()).map(String::from),
        volume: num_field(v, "volumeNum")
            .or_else(|| num_field(v, "volume"))
            .unwrap_or(0.0),
        tokens: parse_outcome_tokens(v),
        outcome_prices: v
            .get("outcomePrices")
            .and_then(|p| p.as_str())
            .map(String::from),
        outcomes: Some(
            v.get("outcomes")
                .and_then(|o| o.as_str())
                .unwrap_or(r#"["Yes", "No"]"#)
                .to_string(),
        ),
        last_trade_price: v.get("lastTradePrice").and_then(|p| p.as_f64()),
        one_day_price_change: v.get("oneDayPriceChange").and_then(|p| p.as_f64()),
        one_week_price_change: v.get("oneWeekPriceChange").and_then(|p| p.as_f64()),
        one_month_price_change: v.get("oneMonthPriceChange").and_then(|p| p.as_f64()),
        ..Market::default()
    }
}

/// Pair the JSON-encoded `clobTokenIds` list with the `outcomes` labels into
/// ordered (token_id, outcome) pairs. Index overflow drops the unpaired tail.
fn parse_outcome_tokens(v: &serde_json::Value) -> Vec<OutcomeToken> {
    let Some(raw_ids) = v.get("clobTokenIds").and_then(|s| s.as_str()) else {
        return Vec::new();
    };
    let Ok(ids) = serde_json::from_str::<Vec<serde_json::Value>>(raw_ids) else {
        return Vec::new();
    };
    let outcomes: Vec<String> = v
        .get("outcomes")
        .and_then(|o| o.as_str())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_else(|| vec!["Yes".to_string(), "No".to_string()]);

    ids.iter()
        .enumerate()
        .filter_map(|(i, id)| {
            let outcome = outcomes.get(i)?;
            let token_id = id
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| id.to_string());
            Some(OutcomeToken {
                token_id,
                outcome: outcome.clone(),
            })
        })
        .collect()
}

fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key).and_then(|s| s.as_str()).unwrap_or("").to_string()
}

fn num_field(v: &serde_json::Value, key: &str) -> Option<f64> {
    v.get(key)
        .and_then(|x| x.as_f64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
}

/// Filter for non-daily markets with a question, a condition id and minimum
/// volume. Upstream active/closed flags are only counted for diagnostics —
/// volume plus time-to-end proved more reliable than upstream bookkeeping.
pub fn filter_active_markets(
    markets: Vec<Market>,
    min_volume: f64,
    now: DateTime<Utc>,
) -> (Vec<Market>, FilterStats) {
    let mut stats = FilterStats {
        input: markets.len(),
        ..FilterStats::default()
    };
    let mut filtered = Vec::new();

    for market in markets {
        if market.question.is_empty() || market.condition_id.is_empty() {
            continue;
        }

        if market.active {
            stats.active += 1;
        }
        if !market.closed {
            stats.not_closed += 1;
        }

        // Daily-market check is fail-open: an unparseable or missing end date
        // counts as not-ending-soon and the market is kept.
        let ends_soon = market
            .end_date_iso
            .as_deref()
            .and_then(parse_end_date)
            .map(|end| end < now + chrono::Duration::hours(DAILY_CUTOFF_HOURS))
            .unwrap_or(false);
        if !ends_soon {
            stats.future_end += 1;
        }
        if ends_soon {
            continue;
        }

        if market.volume < min_volume {
            continue;
        }

        filtered.push(market);
    }

    stats.kept = filtered.len();
    info!(
        "[FILTER] input={} active={} not_closed={} future_end={} kept={}",
        stats.input, stats.active, stats.not_closed, stats.future_end, stats.kept,
    );
    (filtered, stats)
}

/// Parse an ISO 8601 timestamp, normalizing a trailing `Z` to `+00:00`.
pub fn parse_end_date(s: &str) -> Option<DateTime<Utc>> {
    let normalized = if let Some(stripped) = s.strip_suffix('Z') {
        format!("{stripped}+00:00")
    } else {
        s.to_string()
    };
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn gamma_record() -> serde_json::Value {
        json!({
            "conditionId": "0xabc",
            "questionID": "0xq",
            "question": "Will it happen?",
            "slug": "will-it-happen",
            "endDate": "2030-06-01T00:00:00Z",
            "category": "Politics",
            "active": true,
            "closed": false,
            "volumeNum": 52000.5,
            "clobTokenIds": "[\"111\", \"222\"]",
            "outcomes": "[\"Yes\", \"No\"]",
            "outcomePrices": "[\"0.6\", \"0.4\"]",
            "lastTradePrice": 0.6,
            "oneWeekPriceChange": 0.05
        })
    }

    fn market(question: &str, condition_id: &str, volume: f64, end: Option<&str>) -> Market {
        Market {
            condition_id: condition_id.to_string(),
            question: question.to_string(),
            volume,
            end_date_iso: end.map(String::from),
            ..Market::default()
        }
    }

    #[test]
    fn gamma_record_converts_with_paired_tokens() {
        let m = parse_gamma_market(&gamma_record());
        assert_eq!(m.condition_id, "0xabc");
        assert_eq!(m.slug, "will-it-happen");
        assert_eq!(m.tokens.len(), 2);
        assert_eq!(m.tokens[0].token_id, "111");
        assert_eq!(m.tokens[0].outcome, "Yes");
        assert_eq!(m.tokens[1].outcome, "No");
        assert!((m.volume - 52000.5).abs() < 1e-9);
        assert_eq!(m.one_week_price_change, Some(0.05));
    }

    #[test]
    fn bad_token_json_skips_pairing_not_record() {
        let mut v = gamma_record();
        v["clobTokenIds"] = json!("not json");
        let m = parse_gamma_market(&v);
        assert!(m.tokens.is_empty());
        assert_eq!(m.condition_id, "0xabc");
    }

    #[test]
    fn extra_token_ids_beyond_outcomes_are_dropped() {
        let mut v = gamma_record();
        v["clobTokenIds"] = json!("[\"111\", \"222\", \"333\"]");
        let m = parse_gamma_market(&v);
        assert_eq!(m.tokens.len(), 2);
    }

    #[test]
    fn volume_falls_back_to_string_volume_field() {
        let mut v = gamma_record();
        v.as_object_mut().unwrap().remove("volumeNum");
        v["volume"] = json!("12345.0");
        let m = parse_gamma_market(&v);
        assert!((m.volume - 12345.0).abs() < 1e-9);
    }

    #[test]
    fn missing_category_defaults_to_other() {
        let mut v = gamma_record();
        v.as_object_mut().unwrap().remove("category");
        assert_eq!(parse_gamma_market(&v).category, "Other");
    }

    #[test]
    fn filter_drops_missing_question_or_condition_id() {
        let now = Utc::now();
        let markets = vec![
            market("", "0x1", 50000.0, None),
            market("Q?", "", 50000.0, None),
            market("Q?", "0x2", 50000.0, None),
        ];
        let (kept, stats) = filter_active_markets(markets, 10000.0, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].condition_id, "0x2");
        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn filter_drops_daily_markets_ending_within_48h() {
        let now = Utc::now();
        let soon = (now + Duration::hours(10)).to_rfc3339();
        let later = (now + Duration::hours(72)).to_rfc3339();
        let markets = vec![
            market("Ends soon", "0x1", 50000.0, Some(&soon)),
            market("Ends later", "0x2", 50000.0, Some(&later)),
        ];
        let (kept, _) = filter_active_markets(markets, 10000.0, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].condition_id, "0x2");
    }

    #[test]
    fn unparseable_end_date_is_kept_fail_open() {
        let now = Utc::now();
        let markets = vec![market("Garbled", "0x1", 50000.0, Some("not-a-date"))];
        let (kept, stats) = filter_active_markets(markets, 10000.0, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.future_end, 1);
    }

    #[test]
    fn filter_enforces_min_volume() {
        let now = Utc::now();
        let markets = vec![
            market("Thin", "0x1", 500.0, None),
            market("Thick", "0x2", 50000.0, None),
        ];
        let (kept, _) = filter_active_markets(markets, 10000.0, now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].condition_id, "0x2");
    }

    #[test]
    fn z_suffix_normalizes_to_utc_offset() {
        let parsed = parse_end_date("2030-06-01T12:00:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2030-06-01T12:00:00+00:00");
        assert!(parse_end_date("June 1st").is_none());
    }

    #[test]
    fn clob_record_deserializes_directly() {
        let raw = json!({
            "condition_id": "0xclob",
            "question_id": "0xq",
            "question": "CLOB shaped?",
            "market_slug": "clob-shaped",
            "end_date_iso": "2030-01-01T00:00:00Z",
            "active": true,
            "closed": false,
            "volume": "42000",
            "tokens": [
                {"token_id": "1", "outcome": "Yes"},
                {"token_id": "2", "outcome": "No"}
            ]
        });
        let m: Market = serde_json::from_value(raw).unwrap();
        assert_eq!(m.condition_id, "0xclob");
        assert_eq!(m.slug, "clob-shaped");
        assert_eq!(m.category, "Other");
        assert!((m.volume - 42000.0).abs() < 1e-9);
        assert_eq!(m.tokens.len(), 2);
    }
}
