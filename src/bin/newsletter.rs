//! Operator CLI for one-off newsletter runs.
//!
//! Usage:
//!   newsletter generate [output-file]   Generate markdown to newsletters/
//!   newsletter send                     Full weekly run: generate + email + archive
//!   newsletter summary                  Console digest of current movements
//!   newsletter search <term>            Analyze markets matching a term
//!   newsletter config                   Show effective settings
//!
//! Flags (any command, override the env-derived settings for this run):
//!   --min-volume <usd>  --min-change <pct>  --max-markets <n>
//!   --hours <n>  --limit <n>

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use reality_index::config::Config;
use reality_index::error::Result;
use reality_index::newsletter::{NewsletterAi, NewsletterGenerator};
use reality_index::processor::{calculate_price_changes, MarketDataProcessor};
use reality_index::fetcher;

#[tokio::main]
async fn main() {
    let mut cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match apply_overrides(&mut cfg, raw) {
        Ok(positional) => positional,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    let command = args.first().map(String::as_str).unwrap_or("");

    let outcome = match command {
        "generate" => generate(&cfg, args.get(1).map(String::as_str)).await,
        "send" => send_all(&cfg).await,
        "summary" => summary(&cfg).await,
        "search" => match args.get(1) {
            Some(term) => search(&cfg, term).await,
            None => {
                eprintln!("Usage: newsletter search <term>");
                std::process::exit(2);
            }
        },
        "config" => {
            print_config(&cfg);
            Ok(())
        }
        _ => {
            eprintln!("Usage: newsletter <generate|send|summary|search|config>");
            std::process::exit(2);
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Pull `--flag value` overrides out of the argument list, leaving the
/// command and its positional arguments behind.
fn apply_overrides(
    cfg: &mut Config,
    args: Vec<String>,
) -> std::result::Result<Vec<String>, String> {
    let mut positional = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--min-volume" => cfg.min_volume = flag_value(&mut iter, &arg)?,
            "--min-change" => cfg.min_change_pct = flag_value(&mut iter, &arg)?,
            "--max-markets" => cfg.max_markets = flag_value(&mut iter, &arg)?,
            "--hours" => cfg.hours_analyzed = flag_value(&mut iter, &arg)?,
            "--limit" => cfg.market_limit = Some(flag_value(&mut iter, &arg)?),
            other if other.starts_with("--") => return Err(format!("Unknown flag: {other}")),
            _ => positional.push(arg),
        }
    }
    Ok(positional)
}

fn flag_value<T: std::str::FromStr>(
    iter: &mut impl Iterator<Item = String>,
    flag: &str,
) -> std::result::Result<T, String> {
    let value = iter
        .next()
        .ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("{flag}: invalid value '{value}'"))
}

async fn open_pool(cfg: &Config) -> Result<sqlx::SqlitePool> {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

async fn generate(cfg: &Config, output: Option<&str>) -> Result<()> {
    let pool = open_pool(cfg).await?;
    let generator = NewsletterGenerator::new(cfg.clone(), pool);

    let file_name = output.map(str::to_string).unwrap_or_else(|| {
        format!("newsletter_{}.md", Utc::now().format("%Y%m%d_%H%M%S"))
    });
    // No topic focus for ad-hoc runs; the writer covers everything.
    let path = generator.generate_to_file(&[], &file_name).await?;
    println!("Newsletter saved to {}", path.display());
    Ok(())
}

async fn send_all(cfg: &Config) -> Result<()> {
    let pool = open_pool(cfg).await?;
    let generator = NewsletterGenerator::new(cfg.clone(), pool);
    let report = generator.generate_and_send_all().await?;

    println!("Newsletter distribution complete");
    println!("  Topic combinations: {}", report.total_combinations);
    println!("  Newsletters generated: {}", report.newsletters_generated);
    println!("  Emails sent: {}", report.total_emails_sent);
    for result in &report.results {
        match &result.error {
            Some(e) => println!("  {:?}: FAILED ({e})", result.topics),
            None => println!(
                "  {:?}: {} sent, {} failed",
                result.topics, result.successful_sends, result.failed_sends
            ),
        }
    }
    Ok(())
}

async fn summary(cfg: &Config) -> Result<()> {
    println!("Fetching market summary...");

    let processor = MarketDataProcessor::new(
        cfg.min_volume,
        cfg.min_change_pct,
        cfg.max_markets,
        cfg.hours_analyzed,
    );
    let all_markets = fetcher::get_all_markets(cfg, cfg.market_limit).await?;
    let (active, _stats) = fetcher::filter_active_markets(all_markets, cfg.min_volume, Utc::now());
    let with_changes = calculate_price_changes(&active);
    let data = processor.create_newsletter_data(&with_changes, Utc::now());

    println!();
    println!("POLYMARKET MOVEMENT SUMMARY");
    println!("{}", "=".repeat(50));
    println!("Markets Analyzed: {}", data.summary_stats.total_markets_analyzed);
    println!("Significant Moves: {}", data.summary_stats.significant_moves);
    println!("Average Change: {}", data.summary_stats.avg_change_pct);
    println!("Time Period: Last {} hours", cfg.hours_analyzed);
    println!();

    if data.top_markets.is_empty() {
        println!("No significant movements detected.");
        return Ok(());
    }

    println!("TOP MOVEMENTS:");
    for (i, market) in data.top_markets.iter().take(5).enumerate() {
        println!("{}. {} {}", i + 1, market.direction, market.question);
        println!(
            "   {} → {} ({} change)",
            market.previous_price, market.current_price, market.change_pct
        );
        println!("   Volume: {} | {}", market.volume, market.category);
        println!();
    }

    for insight in processor.generate_market_insights(&with_changes) {
        println!("• {insight}");
    }
    Ok(())
}

async fn search(cfg: &Config, term: &str) -> Result<()> {
    println!("Searching for markets containing: '{term}'...");

    let all_markets = fetcher::get_all_markets(cfg, cfg.market_limit).await?;
    let needle = term.to_lowercase();
    let matching: Vec<_> = all_markets
        .into_iter()
        .filter(|m| m.question.to_lowercase().contains(&needle))
        .collect();

    if matching.is_empty() {
        println!("No markets found containing '{term}'");
        return Ok(());
    }
    println!("Found {} matching markets", matching.len());

    let processor = MarketDataProcessor::new(
        cfg.min_volume,
        cfg.min_change_pct,
        cfg.max_markets,
        cfg.hours_analyzed,
    );
    let with_changes = calculate_price_changes(&matching);
    let ai = NewsletterAi::new(cfg).ok();

    for market in &with_changes {
        let formatted = processor.format_market_summary(market);
        println!();
        println!("{}", formatted.question);
        println!("   Category: {}", formatted.category);
        println!(
            "   Price: {} → {} ({} {})",
            formatted.previous_price, formatted.current_price, formatted.direction,
            formatted.change_pct
        );
        println!("   Volume: {}", formatted.volume);
        println!("   Closes: {}", formatted.end_date);

        if let Some(ai) = &ai {
            let analysis = ai.generate_market_analysis(&formatted).await;
            println!();
            println!("   Analysis: {analysis}");
        }
    }
    Ok(())
}

fn print_config(cfg: &Config) {
    println!("CURRENT CONFIGURATION");
    println!("{}", "=".repeat(50));
    println!("min_volume: ${:.0}", cfg.min_volume);
    println!("min_change_pct: {}%", cfg.min_change_pct);
    println!("max_markets: {}", cfg.max_markets);
    println!("hours_analyzed: {}", cfg.hours_analyzed);
    println!("newsletter_format: {}", cfg.newsletter_format);
    println!("send slot: {:?} {:02}:00 UTC", cfg.send_weekday, cfg.send_hour_utc);
    println!("db_path: {}", cfg.db_path);
    println!(
        "openai: {}",
        if cfg.openai_api_key.is_some() { "configured" } else { "missing" }
    );
    println!(
        "postmark: {}",
        if cfg.postmark_api_key.is_some() { "configured" } else { "missing" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn overrides_update_config_and_keep_positionals() {
        let mut cfg = Config::default();
        let rest = apply_overrides(
            &mut cfg,
            args(&[
                "summary",
                "--min-volume", "25000",
                "--min-change", "5.5",
                "--max-markets", "20",
                "--hours", "72",
                "--limit", "500",
            ]),
        )
        .unwrap();

        assert_eq!(rest, vec!["summary"]);
        assert_eq!(cfg.min_volume, 25000.0);
        assert_eq!(cfg.min_change_pct, 5.5);
        assert_eq!(cfg.max_markets, 20);
        assert_eq!(cfg.hours_analyzed, 72);
        assert_eq!(cfg.market_limit, Some(500));
    }

    #[test]
    fn no_flags_leaves_config_untouched() {
        let mut cfg = Config::default();
        let rest = apply_overrides(&mut cfg, args(&["search", "bitcoin"])).unwrap();
        assert_eq!(rest, vec!["search", "bitcoin"]);
        assert_eq!(cfg.min_volume, Config::default().min_volume);
        assert_eq!(cfg.market_limit, None);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let mut cfg = Config::default();
        let err = apply_overrides(&mut cfg, args(&["summary", "--verbose"])).unwrap_err();
        assert!(err.contains("--verbose"));
    }

    #[test]
    fn missing_or_bad_values_are_rejected() {
        let mut cfg = Config::default();
        let err = apply_overrides(&mut cfg, args(&["summary", "--min-volume"])).unwrap_err();
        assert!(err.contains("requires a value"));

        let err = apply_overrides(&mut cfg, args(&["summary", "--hours", "soon"])).unwrap_err();
        assert!(err.contains("soon"));
    }
}
