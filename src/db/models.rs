//! Database row types. Used by sqlx for typed queries; `topics` columns hold
//! a canonical sorted JSON array.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: i64,
    pub email: String,
    pub topics: String,
    pub created_at: i64,
    pub active: bool,
    pub unsubscribe_token: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ArchiveRow {
    pub id: i64,
    pub topics: String,
    pub title: String,
    pub content_html: String,
    pub content_markdown: String,
    pub sent_at: i64,
    pub subscriber_count: i64,
}

/// A subscription with its topic list decoded.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub email: String,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub unsubscribe_token: String,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            email: row.email,
            topics: serde_json::from_str(&row.topics).unwrap_or_default(),
            created_at: DateTime::from_timestamp(row.created_at, 0)
                .unwrap_or(DateTime::UNIX_EPOCH),
            id: row.id,
            active: row.active,
            unsubscribe_token: row.unsubscribe_token,
        }
    }
}

/// An archived newsletter with topics decoded, as served by the preview API.
#[derive(Debug, Clone, Serialize)]
pub struct ArchivedNewsletter {
    pub id: i64,
    pub topics: Vec<String>,
    pub title: String,
    pub content_html: String,
    pub content_markdown: String,
    pub sent_at: DateTime<Utc>,
    pub subscriber_count: i64,
}

impl From<ArchiveRow> for ArchivedNewsletter {
    fn from(row: ArchiveRow) -> Self {
        Self {
            topics: serde_json::from_str(&row.topics).unwrap_or_default(),
            sent_at: DateTime::from_timestamp(row.sent_at, 0).unwrap_or(DateTime::UNIX_EPOCH),
            id: row.id,
            title: row.title,
            content_html: row.content_html,
            content_markdown: row.content_markdown,
            subscriber_count: row.subscriber_count,
        }
    }
}
