//! End-to-end newsletter runs: fetch markets, build the structured summary,
//! write one newsletter per subscribed topic combination, deliver and
//! archive it.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::email::{self, PostmarkSender};
use crate::error::{AppError, Result};
use crate::fetcher;
use crate::newsletter::NewsletterAi;
use crate::processor::{self, MarketDataProcessor};
use crate::types::NewsletterData;
use crate::{db, topics};

#[derive(Debug, Clone, Serialize)]
pub struct CombinationResult {
    pub topics: Vec<String>,
    pub subscriber_count: usize,
    pub successful_sends: usize,
    pub failed_sends: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DistributionReport {
    pub total_combinations: usize,
    pub newsletters_generated: usize,
    pub total_emails_sent: usize,
    pub results: Vec<CombinationResult>,
}

pub struct NewsletterGenerator {
    cfg: Config,
    pool: SqlitePool,
    processor: MarketDataProcessor,
}

impl NewsletterGenerator {
    pub fn new(cfg: Config, pool: SqlitePool) -> Self {
        let processor = MarketDataProcessor::new(
            cfg.min_volume,
            cfg.min_change_pct,
            cfg.max_markets,
            cfg.hours_analyzed,
        );
        Self { cfg, pool, processor }
    }

    pub fn processor(&self) -> &MarketDataProcessor {
        &self.processor
    }

    /// Run the market pipeline once. Returns `Ok(None)` when no markets
    /// survive a stage; that is a quiet week, not an error.
    pub async fn build_newsletter_data(&self) -> Result<Option<NewsletterData>> {
        let all_markets = fetcher::get_all_markets(&self.cfg, self.cfg.market_limit).await?;
        info!("Fetched {} total markets", all_markets.len());

        let (active, _stats) =
            fetcher::filter_active_markets(all_markets, self.cfg.min_volume, Utc::now());
        if active.is_empty() {
            info!("No markets meet the volume and activity criteria");
            return Ok(None);
        }

        let with_changes = processor::calculate_price_changes(&active);
        info!("{} markets have usable weekly price data", with_changes.len());
        if with_changes.is_empty() {
            info!("No markets have sufficient price history");
            return Ok(None);
        }

        Ok(Some(self.processor.create_newsletter_data(&with_changes, Utc::now())))
    }

    /// Generate newsletter markdown focused on one topic combination.
    pub async fn generate_for_topics(&self, topic_keys: &[String]) -> Result<Option<String>> {
        info!("Generating newsletter for topics: {topic_keys:?}");

        let Some(data) = self.build_newsletter_data().await? else {
            return Ok(None);
        };

        let ai = NewsletterAi::new(&self.cfg)?;
        let context = topics::prompt_context_for_topics(topic_keys);
        let content = ai
            .generate_newsletter(&data, &self.cfg.newsletter_format, Some(&context))
            .await?;
        Ok(Some(content))
    }

    /// Generate once and write the markdown under `newsletters/`.
    pub async fn generate_to_file(
        &self,
        topic_keys: &[String],
        file_name: &str,
    ) -> Result<std::path::PathBuf> {
        let content = self.generate_for_topics(topic_keys).await?.ok_or_else(|| {
            AppError::Generation("no significant market movements to report".to_string())
        })?;

        let dir = std::path::Path::new("newsletters");
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, &content)?;
        info!("Newsletter saved to {}", path.display());
        Ok(path)
    }

    /// Weekly send: one newsletter per distinct active topic combination.
    /// The market pipeline runs once and is shared across combinations;
    /// only the topic focus given to the writer differs.
    pub async fn generate_and_send_all(&self) -> Result<DistributionReport> {
        let combinations = db::unique_topic_combinations(&self.pool).await?;
        if combinations.is_empty() {
            info!("No active subscriptions; nothing to send");
            return Ok(DistributionReport::default());
        }
        info!("Found {} unique topic combinations", combinations.len());

        let Some(data) = self.build_newsletter_data().await? else {
            warn!("Market pipeline produced no data; skipping this send");
            return Ok(DistributionReport {
                total_combinations: combinations.len(),
                ..DistributionReport::default()
            });
        };

        let ai = NewsletterAi::new(&self.cfg)?;
        let sender = PostmarkSender::new(&self.cfg)?;

        let mut report = DistributionReport {
            total_combinations: combinations.len(),
            ..DistributionReport::default()
        };

        for combo in combinations {
            match self.run_combination(&data, &combo, &ai, &sender).await {
                Ok(Some(result)) => {
                    report.newsletters_generated += 1;
                    report.total_emails_sent += result.successful_sends;
                    report.results.push(result);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Error processing topics {combo:?}: {e}");
                    report.results.push(CombinationResult {
                        topics: combo,
                        subscriber_count: 0,
                        successful_sends: 0,
                        failed_sends: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            "Distribution complete: {} newsletters, {} emails sent",
            report.newsletters_generated, report.total_emails_sent
        );
        Ok(report)
    }

    async fn run_combination(
        &self,
        data: &NewsletterData,
        combo: &[String],
        ai: &NewsletterAi,
        sender: &PostmarkSender,
    ) -> Result<Option<CombinationResult>> {
        let subscribers = db::subscribers_for_topics(&self.pool, combo).await?;
        if subscribers.is_empty() {
            warn!("No subscribers for topics {combo:?}; skipping");
            return Ok(None);
        }
        info!("Processing {combo:?} for {} subscribers", subscribers.len());

        let context = topics::prompt_context_for_topics(combo);
        let content = ai
            .generate_newsletter(data, &self.cfg.newsletter_format, Some(&context))
            .await?;

        let email_report = sender.send_newsletter(&content, &subscribers, combo).await;

        if email_report.successful_sends > 0 {
            let title = email::extract_ai_title(&content).unwrap_or_else(|| {
                let names: Vec<String> =
                    combo.iter().map(|k| topics::display_name(k)).collect();
                format!("The Reality Index: {} Weekly Update", names.join(" + "))
            });
            // Archived copies carry a placeholder anchor, not a live
            // unsubscribe link.
            let html = email::markdown_to_html(&content, "#preview");
            if let Err(e) = db::archive_newsletter(
                &self.pool,
                combo,
                &title,
                &html,
                &content,
                email_report.successful_sends as i64,
            )
            .await
            {
                warn!("Failed to archive newsletter for {combo:?}: {e}");
            }
        }

        Ok(Some(CombinationResult {
            topics: combo.to_vec(),
            subscriber_count: subscribers.len(),
            successful_sends: email_report.successful_sends,
            failed_sends: email_report.failed_sends,
            error: None,
        }))
    }
}
