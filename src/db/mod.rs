//! SQLite persistence for subscriptions and the newsletter archive.

pub mod models;

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

pub use models::{ArchivedNewsletter, Subscription};

/// Canonical storage form for a topic combination: sorted JSON array. The
/// UNIQUE(email, topics) constraint depends on this normalization.
pub fn canonical_topics(topics: &[String]) -> Result<String> {
    let mut sorted: Vec<&str> = topics.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    Ok(serde_json::to_string(&sorted)?)
}

pub async fn create_subscription(
    pool: &SqlitePool,
    email: &str,
    topics: &[String],
) -> Result<Subscription> {
    let topics_json = canonical_topics(topics)?;
    let token = Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO subscriptions (email, topics, created_at, active, unsubscribe_token) \
         VALUES (?, ?, ?, 1, ?)",
    )
    .bind(email)
    .bind(&topics_json)
    .bind(now)
    .bind(&token)
    .execute(pool)
    .await?;

    let row: models::SubscriptionRow =
        sqlx::query_as("SELECT * FROM subscriptions WHERE unsubscribe_token = ?")
            .bind(&token)
            .fetch_one(pool)
            .await?;
    Ok(row.into())
}

pub async fn get_by_email_and_topics(
    pool: &SqlitePool,
    email: &str,
    topics: &[String],
) -> Result<Option<Subscription>> {
    let topics_json = canonical_topics(topics)?;
    let row: Option<models::SubscriptionRow> =
        sqlx::query_as("SELECT * FROM subscriptions WHERE email = ? AND topics = ?")
            .bind(email)
            .bind(&topics_json)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Into::into))
}

pub async fn get_by_token(pool: &SqlitePool, token: &str) -> Result<Option<Subscription>> {
    let row: Option<models::SubscriptionRow> =
        sqlx::query_as("SELECT * FROM subscriptions WHERE unsubscribe_token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Into::into))
}

pub async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> Result<()> {
    sqlx::query("UPDATE subscriptions SET active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn active_subscriptions(pool: &SqlitePool) -> Result<Vec<Subscription>> {
    let rows: Vec<models::SubscriptionRow> =
        sqlx::query_as("SELECT * FROM subscriptions WHERE active = 1 ORDER BY id")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Active subscribers for one exact topic combination.
pub async fn subscribers_for_topics(
    pool: &SqlitePool,
    topics: &[String],
) -> Result<Vec<Subscription>> {
    let topics_json = canonical_topics(topics)?;
    let rows: Vec<models::SubscriptionRow> =
        sqlx::query_as("SELECT * FROM subscriptions WHERE active = 1 AND topics = ? ORDER BY id")
            .bind(&topics_json)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Distinct topic combinations across active subscriptions, one newsletter
/// each per send run.
pub async fn unique_topic_combinations(pool: &SqlitePool) -> Result<Vec<Vec<String>>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT topics FROM subscriptions WHERE active = 1 ORDER BY topics",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(json,)| serde_json::from_str(&json).unwrap_or_default())
        .collect())
}

pub async fn archive_newsletter(
    pool: &SqlitePool,
    topics: &[String],
    title: &str,
    content_html: &str,
    content_markdown: &str,
    subscriber_count: i64,
) -> Result<i64> {
    let topics_json = canonical_topics(topics)?;
    let now = Utc::now().timestamp();

    let result = sqlx::query(
        "INSERT INTO newsletter_archive \
         (topics, title, content_html, content_markdown, sent_at, subscriber_count) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&topics_json)
    .bind(title)
    .bind(content_html)
    .bind(content_markdown)
    .bind(now)
    .bind(subscriber_count)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn newsletters_by_topics(
    pool: &SqlitePool,
    topics: &[String],
    limit: i64,
) -> Result<Vec<ArchivedNewsletter>> {
    let topics_json = canonical_topics(topics)?;
    let rows: Vec<models::ArchiveRow> = sqlx::query_as(
        "SELECT * FROM newsletter_archive WHERE topics = ? ORDER BY sent_at DESC, id DESC LIMIT ?",
    )
    .bind(&topics_json)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn newsletter_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ArchivedNewsletter>> {
    let row: Option<models::ArchiveRow> =
        sqlx::query_as("SELECT * FROM newsletter_archive WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Into::into))
}

pub async fn recent_newsletters(pool: &SqlitePool, limit: i64) -> Result<Vec<ArchivedNewsletter>> {
    let rows: Vec<models::ArchiveRow> = sqlx::query_as(
        "SELECT * FROM newsletter_archive ORDER BY sent_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SubscriptionStats {
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub topic_breakdown: Vec<(String, i64)>,
}

pub async fn subscription_stats(pool: &SqlitePool) -> Result<SubscriptionStats> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions")
        .fetch_one(pool)
        .await?;
    let (active,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE active = 1")
        .fetch_one(pool)
        .await?;

    let mut topic_breakdown = Vec::with_capacity(crate::topics::TOPICS.len());
    for topic in crate::topics::TOPICS {
        // Topics are stored JSON-quoted, so a substring probe is exact.
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM subscriptions WHERE active = 1 AND topics LIKE ?",
        )
        .bind(format!("%\"{}\"%", topic.key))
        .fetch_one(pool)
        .await?;
        topic_breakdown.push((topic.key.to_string(), count));
    }

    Ok(SubscriptionStats {
        total_subscriptions: total,
        active_subscriptions: active,
        topic_breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn topics(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn create_and_lookup_roundtrip() {
        let pool = test_pool().await;
        let sub = create_subscription(&pool, "a@example.com", &topics(&["crypto", "ai"]))
            .await
            .unwrap();
        assert!(sub.active);
        assert_eq!(sub.topics, vec!["ai", "crypto"]);

        // Lookup is order-insensitive thanks to canonicalization.
        let found = get_by_email_and_topics(&pool, "a@example.com", &topics(&["ai", "crypto"]))
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.id), Some(sub.id));

        let by_token = get_by_token(&pool, &sub.unsubscribe_token).await.unwrap();
        assert_eq!(by_token.map(|s| s.email), Some("a@example.com".to_string()));
    }

    #[tokio::test]
    async fn duplicate_combination_violates_unique_constraint() {
        let pool = test_pool().await;
        create_subscription(&pool, "a@example.com", &topics(&["ai"]))
            .await
            .unwrap();
        let dup = create_subscription(&pool, "a@example.com", &topics(&["ai"])).await;
        assert!(dup.is_err());

        // Same email with a different combination is fine.
        create_subscription(&pool, "a@example.com", &topics(&["ai", "tech"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unsubscribe_and_reactivate() {
        let pool = test_pool().await;
        let sub = create_subscription(&pool, "a@example.com", &topics(&["sports"]))
            .await
            .unwrap();

        set_active(&pool, sub.id, false).await.unwrap();
        let sub = get_by_token(&pool, &sub.unsubscribe_token).await.unwrap().unwrap();
        assert!(!sub.active);
        assert!(active_subscriptions(&pool).await.unwrap().is_empty());

        set_active(&pool, sub.id, true).await.unwrap();
        assert_eq!(active_subscriptions(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn combinations_are_deduped_and_exclude_inactive() {
        let pool = test_pool().await;
        create_subscription(&pool, "a@example.com", &topics(&["ai"])).await.unwrap();
        create_subscription(&pool, "b@example.com", &topics(&["ai"])).await.unwrap();
        create_subscription(&pool, "c@example.com", &topics(&["crypto", "ai"]))
            .await
            .unwrap();
        let inactive = create_subscription(&pool, "d@example.com", &topics(&["tech"]))
            .await
            .unwrap();
        set_active(&pool, inactive.id, false).await.unwrap();

        let combos = unique_topic_combinations(&pool).await.unwrap();
        assert_eq!(combos.len(), 2);
        assert!(combos.contains(&vec!["ai".to_string()]));
        assert!(combos.contains(&vec!["ai".to_string(), "crypto".to_string()]));

        let ai_subs = subscribers_for_topics(&pool, &topics(&["ai"])).await.unwrap();
        assert_eq!(ai_subs.len(), 2);
    }

    #[tokio::test]
    async fn archive_ordering_and_lookup() {
        let pool = test_pool().await;
        let t = topics(&["economics"]);
        let first = archive_newsletter(&pool, &t, "Week 1", "<p>1</p>", "# 1", 3)
            .await
            .unwrap();
        let second = archive_newsletter(&pool, &t, "Week 2", "<p>2</p>", "# 2", 4)
            .await
            .unwrap();

        let recent = newsletters_by_topics(&pool, &t, 5).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second);

        let fetched = newsletter_by_id(&pool, first).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Week 1");
        assert_eq!(fetched.subscriber_count, 3);
        assert!(newsletter_by_id(&pool, 9999).await.unwrap().is_none());

        let all = recent_newsletters(&pool, 1).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn stats_count_per_topic() {
        let pool = test_pool().await;
        create_subscription(&pool, "a@example.com", &topics(&["ai", "crypto"]))
            .await
            .unwrap();
        create_subscription(&pool, "b@example.com", &topics(&["ai"])).await.unwrap();
        let gone = create_subscription(&pool, "c@example.com", &topics(&["crypto"]))
            .await
            .unwrap();
        set_active(&pool, gone.id, false).await.unwrap();

        let stats = subscription_stats(&pool).await.unwrap();
        assert_eq!(stats.total_subscriptions, 3);
        assert_eq!(stats.active_subscriptions, 2);
        let count = |key: &str| {
            stats
                .topic_breakdown
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, c)| *c)
                .unwrap()
        };
        assert_eq!(count("ai"), 2);
        assert_eq!(count("crypto"), 1);
        assert_eq!(count("sports"), 0);
    }
}
