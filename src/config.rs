use crate::error::{AppError, Result};

pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const POSTMARK_API_URL: &str = "https://api.postmarkapp.com/email";

/// Gamma pagination page size.
pub const FETCH_PAGE_SIZE: usize = 100;

/// Server-side volume floor applied on the Gamma listing query (volume_num_min).
pub const GAMMA_MIN_VOLUME: f64 = 1000.0;

/// CLOB cursor value signalling end-of-results.
pub const CLOB_END_CURSOR: &str = "LTE=";

/// Markets resolving within this many hours are "daily" markets and excluded
/// from weekly analysis.
pub const DAILY_CUTOFF_HOURS: i64 = 48;

/// Price changes below this magnitude (percentage points) are noise and the
/// market is excluded by the calculator.
pub const MIN_ABS_CHANGE_PCT: f64 = 0.1;

/// Gainers and losers lists are each capped to this many entries.
pub const TOP_MOVERS_CAP: usize = 5;

/// Volume above which a market counts toward the high-volume insight line.
pub const HIGH_VOLUME_THRESHOLD: f64 = 100_000.0;

/// Scheduler tick interval (seconds) — how often the send window is checked.
pub const SCHEDULE_TICK_SECS: u64 = 60;

/// A subscription may carry at most this many topics.
pub const MAX_TOPICS_PER_SUBSCRIPTION: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub gamma_api_url: String,
    pub clob_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Public base URL used in unsubscribe links (BASE_URL)
    pub base_url: String,
    /// Sender address for all outbound mail (FROM_EMAIL)
    pub from_email: String,
    /// OpenAI key — required for generation, not for summary/API (OPENAI_API_KEY)
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Postmark server token — required for sending (POSTMARK_API_KEY)
    pub postmark_api_key: Option<String>,
    /// Minimum market volume in USD (MIN_VOLUME)
    pub min_volume: f64,
    /// Minimum |price change| in percent for a significant move (MIN_CHANGE_PCT)
    pub min_change_pct: f64,
    /// Cap on ranked markets fed to the newsletter (MAX_MARKETS)
    pub max_markets: usize,
    /// Analysis window reported in the newsletter, hours (HOURS_ANALYZED)
    pub hours_analyzed: i64,
    /// Optional cap on fetched markets, for cheap test runs (MARKET_LIMIT)
    pub market_limit: Option<usize>,
    /// Newsletter format key (NEWSLETTER_FORMAT)
    pub newsletter_format: String,
    /// UTC weekday the weekly send fires on (SEND_WEEKDAY)
    pub send_weekday: chrono::Weekday,
    /// UTC hour the weekly send fires at (SEND_HOUR_UTC)
    pub send_hour_utc: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gamma_api_url: GAMMA_API_URL.to_string(),
            clob_api_url: CLOB_API_URL.to_string(),
            log_level: "info".to_string(),
            db_path: "newsletter.db".to_string(),
            api_port: 3000,
            base_url: "https://reality-index.sshh.io".to_string(),
            from_email: "noreply@reality-index.sshh.io".to_string(),
            openai_api_key: None,
            openai_model: "gpt-5".to_string(),
            postmark_api_key: None,
            min_volume: 10000.0,
            min_change_pct: 2.0,
            max_markets: 10000,
            hours_analyzed: 168,
            market_limit: None,
            newsletter_format: "institutional-analysis".to_string(),
            send_weekday: chrono::Weekday::Sat,
            send_hour_utc: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            gamma_api_url: std::env::var("GAMMA_API_URL")
                .unwrap_or_else(|_| GAMMA_API_URL.to_string()),
            clob_api_url: std::env::var("CLOB_API_URL")
                .unwrap_or_else(|_| CLOB_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "newsletter.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "https://reality-index.sshh.io".to_string()),
            from_email: std::env::var("FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@reality-index.sshh.io".to_string()),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-5".to_string()),
            postmark_api_key: std::env::var("POSTMARK_API_KEY").ok(),
            min_volume: std::env::var("MIN_VOLUME")
                .unwrap_or_else(|_| "10000".to_string())
                .parse::<f64>()
                .unwrap_or(10000.0),
            min_change_pct: std::env::var("MIN_CHANGE_PCT")
                .unwrap_or_else(|_| "2.0".to_string())
                .parse::<f64>()
                .unwrap_or(2.0),
            max_markets: std::env::var("MAX_MARKETS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse::<usize>()
                .unwrap_or(10000),
            hours_analyzed: std::env::var("HOURS_ANALYZED")
                .unwrap_or_else(|_| "168".to_string())
                .parse::<i64>()
                .unwrap_or(168),
            market_limit: std::env::var("MARKET_LIMIT")
                .ok()
                .and_then(|s| s.parse::<usize>().ok()),
            newsletter_format: std::env::var("NEWSLETTER_FORMAT")
                .unwrap_or_else(|_| "institutional-analysis".to_string()),
            // Saturday 02:00 UTC == Friday 18:00 PST
            send_weekday: std::env::var("SEND_WEEKDAY")
                .unwrap_or_else(|_| "saturday".to_string())
                .parse::<chrono::Weekday>()
                .map_err(|_| AppError::Config("SEND_WEEKDAY must be a weekday name".to_string()))?,
            send_hour_utc: std::env::var("SEND_HOUR_UTC")
                .unwrap_or_else(|_| "2".to_string())
                .parse::<u32>()
                .unwrap_or(2),
        })
    }
}
