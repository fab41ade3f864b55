//! OpenAI-backed newsletter writer. Talks to the chat-completions endpoint
//! over plain reqwest; the configured model does the editorial work, this
//! module only assembles the prompt and unwraps the first choice.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, OPENAI_API_URL};
use crate::error::{AppError, Result};
use crate::newsletter::formats;
use crate::types::{MarketSummary, NewsletterData};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct NewsletterAi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl NewsletterAi {
    pub fn new(cfg: &Config) -> Result<Self> {
        let api_key = cfg
            .openai_api_key
            .clone()
            .ok_or_else(|| AppError::Config("OPENAI_API_KEY is not set".to_string()))?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()?,
            api_url: OPENAI_API_URL.to_string(),
            api_key,
            model: cfg.openai_model.clone(),
        })
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Generate the full newsletter body in markdown for one format, with an
    /// optional topic focus appended to the analyst instructions.
    pub async fn generate_newsletter(
        &self,
        data: &NewsletterData,
        format_key: &str,
        topic_context: Option<&str>,
    ) -> Result<String> {
        let format = formats::get(format_key).ok_or_else(|| {
            AppError::Generation(format!(
                "unknown newsletter format '{format_key}' (available: {})",
                formats::available_keys().join(", ")
            ))
        })?;

        let prompt = build_newsletter_prompt(data, format);
        let instructions = match topic_context {
            Some(context) => format!("{}\n\nTOPIC FOCUS: {context}", format.developer_instructions),
            None => format.developer_instructions.to_string(),
        };

        info!(
            "Generating {} newsletter for {} markets",
            format.name, data.summary_stats.total_markets_analyzed
        );
        debug!("Prompt length: {} chars", prompt.len());

        self.complete(&instructions, &prompt).await
    }

    /// Short free-form analysis of a single market movement, used by the
    /// search command. Failures degrade to a placeholder instead of erroring
    /// so one bad market does not sink the whole listing.
    pub async fn generate_market_analysis(&self, market: &MarketSummary) -> String {
        let prompt = format!(
            "Analyze this Polymarket movement and provide context:\n\n\
             Market: {}\n\
             Category: {}\n\
             Price Change: {} → {}\n\
             Change: {} {}\n\
             Volume: {}\n\
             End Date: {}\n\n\
             Provide a 2-3 paragraph analysis covering:\n\
             1. What this market is about and why it matters\n\
             2. What might have caused this price movement\n\
             3. What this shift suggests about market sentiment\n\
             4. Any relevant context or recent events\n\n\
             Keep it informative but accessible to general readers.",
            market.question,
            market.category,
            market.previous_price,
            market.current_price,
            market.direction,
            market.change_pct,
            market.volume,
            market.end_date,
        );

        match self
            .complete(
                "You are a prediction market analyst who explains market movements with context and insight.",
                &prompt,
            )
            .await
        {
            Ok(text) => text,
            Err(e) => {
                debug!("Market analysis failed for '{}': {e}", market.question);
                format!("Analysis unavailable for {}", market.question)
            }
        }
    }

    async fn complete(&self, instructions: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instructions,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Generation("OpenAI response had no choices".to_string()))
    }
}

/// Assemble the full generation prompt: market data summary, numbered top
/// movers, then the format template with its placeholders substituted.
fn build_newsletter_prompt(data: &NewsletterData, format: &formats::NewsletterFormat) -> String {
    let mut prompt = format!(
        "Generate a professional newsletter about significant Polymarket movements in the last {} hours.\n\n\
         NEWSLETTER REQUIREMENTS:\n\
         - Write in markdown format\n\
         - Include a compelling headline\n\
         - Start with executive summary of key movements\n\
         - Analyze the top market shifts with context about why they matter\n\
         - Use emojis sparingly and professionally\n\
         - Focus on implications, not just numbers\n\n\
         MARKET DATA SUMMARY:\n\
         - Total markets analyzed: {}\n\
         - Significant moves (>{}): {}\n\
         - Volume threshold: {}\n\
         - Average change magnitude: {}\n\
         - Generated: {}\n\n\
         TOP MARKET MOVEMENTS:\n",
        data.config.hours_analyzed,
        data.summary_stats.total_markets_analyzed,
        data.config.min_change_threshold,
        data.summary_stats.significant_moves,
        data.config.min_volume,
        data.summary_stats.avg_change_pct,
        data.timestamp,
    );

    for (i, market) in data.top_markets.iter().enumerate() {
        prompt.push_str(&format!(
            "\n{}. **{}**\n   - Category: {}\n   - Price: {} → {} ({} {})\n   - Volume: {}\n   - Closes: {}\n",
            i + 1,
            market.question,
            market.category,
            market.previous_price,
            market.current_price,
            market.direction,
            market.change_pct,
            market.volume,
            market.end_date,
        ));
    }

    let template = format
        .template
        .replace("{timestamp}", &data.timestamp)
        .replace(
            "{total_markets}",
            &data.summary_stats.total_markets_analyzed.to_string(),
        );
    prompt.push_str(&template);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PipelineConfigSummary, SummaryStats};
    use chrono::Utc;

    fn sample_data() -> NewsletterData {
        let processor = crate::processor::MarketDataProcessor::new(10000.0, 1.0, 10, 168);
        let mut market = crate::types::Market {
            condition_id: "c1".to_string(),
            question: "Will rates fall?".to_string(),
            category: "economics".to_string(),
            volume: 1_500_000.0,
            current_yes_price: Some(0.62),
            historical_yes_price: Some(0.55),
            price_change: Some(0.07),
            price_change_pct: Some(12.7),
            ..crate::types::Market::default()
        };
        market.slug = "will-rates-fall".to_string();
        processor.create_newsletter_data(std::slice::from_ref(&market), Utc::now())
    }

    #[test]
    fn prompt_includes_summary_and_markets() {
        let data = sample_data();
        let format = formats::get("institutional-analysis").unwrap();
        let prompt = build_newsletter_prompt(&data, format);

        assert!(prompt.contains("in the last 168 hours"));
        assert!(prompt.contains("Will rates fall?"));
        assert!(prompt.contains("55.0% → 62.0%"));
        assert!(prompt.contains("$1.5M"));
    }

    #[test]
    fn template_placeholders_are_substituted() {
        let data = sample_data();
        let format = formats::get("executive-brief").unwrap();
        let prompt = build_newsletter_prompt(&data, format);

        assert!(!prompt.contains("{timestamp}"));
        assert!(!prompt.contains("{total_markets}"));
        assert!(prompt.contains(&format!("Generated: {} | 1 markets analyzed", data.timestamp)));
    }

    #[test]
    fn empty_stats_prompt_builds() {
        let data = NewsletterData {
            timestamp: "2026-01-02 03:04 UTC".to_string(),
            summary_stats: SummaryStats {
                total_markets_analyzed: 0,
                significant_moves: 0,
                avg_change_pct: "0.0%".to_string(),
                gainers_count: 0,
                losers_count: 0,
            },
            top_markets: vec![],
            gainers: vec![],
            losers: vec![],
            by_category: vec![],
            config: PipelineConfigSummary {
                hours_analyzed: 168,
                min_volume: "$10K".to_string(),
                min_change_threshold: "2%".to_string(),
            },
        };
        let format = formats::get("institutional-analysis").unwrap();
        let prompt = build_newsletter_prompt(&data, format);
        assert!(prompt.contains("Total markets analyzed: 0"));
    }
}
