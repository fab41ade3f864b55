//! Newsletter topic catalog. Single source of truth for the topic keys the
//! subscription API accepts and the prompt context each one contributes to
//! generation.

#[derive(Debug, Clone, Copy)]
pub struct Topic {
    pub key: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub prompt_context: &'static str,
}

pub static TOPICS: &[Topic] = &[
    Topic {
        key: "us_politics",
        display_name: "US Politics",
        description: "US politics, elections, domestic policy, and American political developments",
        prompt_context: "Focus on US domestic politics, presidential and congressional elections, American policy decisions, Supreme Court cases, state-level political developments, and domestic governance issues affecting the United States.",
    },
    Topic {
        key: "world_politics",
        display_name: "World Politics",
        description: "International relations, geopolitics, global conflicts, and foreign affairs",
        prompt_context: "Emphasize international relations, geopolitical conflicts, global diplomacy, foreign policy decisions, international treaties, global security issues, and relationships between nations and international organizations.",
    },
    Topic {
        key: "sports",
        display_name: "Sports",
        description: "Sports betting markets, player performance, team outcomes, and athletic competitions",
        prompt_context: "Highlight sports betting markets, player performance predictions, team success probabilities, championship outcomes, draft predictions, trade possibilities, and major sporting event results across all professional and amateur athletics.",
    },
    Topic {
        key: "crypto",
        display_name: "Crypto",
        description: "Cryptocurrency prices, blockchain adoption, DeFi developments, and digital asset trends",
        prompt_context: "Focus on cryptocurrency price predictions, blockchain technology adoption, DeFi protocol developments, NFT market trends, regulatory decisions affecting digital assets, and major cryptocurrency project launches or updates.",
    },
    Topic {
        key: "economics",
        display_name: "Economics",
        description: "Economic indicators, market conditions, inflation, interest rates, and financial markets",
        prompt_context: "Emphasize economic indicators like GDP, inflation, unemployment, Federal Reserve decisions, interest rate changes, stock market performance, recession predictions, and major financial market developments.",
    },
    Topic {
        key: "tech",
        display_name: "Tech",
        description: "Technology companies, product launches, industry trends, and general tech innovation",
        prompt_context: "Highlight major technology company developments, product launches, IPO predictions, tech industry mergers and acquisitions, startup valuations, and broader technology adoption trends across industries.",
    },
    Topic {
        key: "ai",
        display_name: "AI",
        description: "Artificial intelligence breakthroughs, AI company developments, and machine learning advances",
        prompt_context: "Focus specifically on artificial intelligence breakthroughs, AI company funding and developments, machine learning advances, AI regulation and policy, AI safety discussions, and predictions about AI capability milestones.",
    },
    Topic {
        key: "culture",
        display_name: "Culture",
        description: "Entertainment, movies, celebrity events, cultural trends, and pop culture phenomena",
        prompt_context: "Emphasize entertainment industry predictions, movie and show success rates, celebrity news and events, cultural trend forecasts, awards show outcomes, and broader pop culture phenomenon predictions.",
    },
];

pub fn get(key: &str) -> Option<&'static Topic> {
    TOPICS.iter().find(|t| t.key == key)
}

pub fn is_valid_key(key: &str) -> bool {
    get(key).is_some()
}

/// Display name for a key, falling back to a title-cased rendering of the
/// key itself for values that predate the catalog.
pub fn display_name(key: &str) -> String {
    match get(key) {
        Some(topic) => topic.display_name.to_string(),
        None => crate::processor::title_case(&key.replace('_', " ")),
    }
}

const DEFAULT_PROMPT_CONTEXT: &str =
    "Provide comprehensive coverage of all prediction market developments.";

/// Combined generation context for a subscription's topic set.
pub fn prompt_context_for_topics(keys: &[String]) -> String {
    let contexts: Vec<&str> = keys
        .iter()
        .filter_map(|k| get(k).map(|t| t.prompt_context))
        .collect();

    match contexts.len() {
        0 => DEFAULT_PROMPT_CONTEXT.to_string(),
        1 => contexts[0].to_string(),
        _ => format!(
            "Focus on the following areas: {} Ensure balanced coverage across these topic areas while maintaining the newsletter's prediction market analysis focus.",
            contexts.join(" Additionally, ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_eight_unique_keys() {
        assert_eq!(TOPICS.len(), 8);
        let mut keys: Vec<&str> = TOPICS.iter().map(|t| t.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 8);
    }

    #[test]
    fn lookup_and_validation() {
        assert!(is_valid_key("crypto"));
        assert!(!is_valid_key("weather"));
        assert_eq!(get("ai").map(|t| t.display_name), Some("AI"));
    }

    #[test]
    fn display_name_falls_back_to_title_case() {
        assert_eq!(display_name("us_politics"), "US Politics");
        assert_eq!(display_name("board_games"), "Board Games");
    }

    #[test]
    fn prompt_context_combines_and_defaults() {
        assert_eq!(prompt_context_for_topics(&[]), DEFAULT_PROMPT_CONTEXT);
        assert_eq!(
            prompt_context_for_topics(&["unknown".to_string()]),
            DEFAULT_PROMPT_CONTEXT
        );

        let single = prompt_context_for_topics(&["ai".to_string()]);
        assert!(single.starts_with("Focus specifically on artificial intelligence"));

        let combined =
            prompt_context_for_topics(&["ai".to_string(), "crypto".to_string()]);
        assert!(combined.starts_with("Focus on the following areas: "));
        assert!(combined.contains(" Additionally, "));
        assert!(combined.ends_with("prediction market analysis focus."));
    }
}
