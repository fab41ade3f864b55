use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{Config, MAX_TOPICS_PER_SUBSCRIPTION};
use crate::email::{self, PostmarkSender};
use crate::error::AppError;
use crate::{db, topics};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub cfg: Config,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/subscribe", post(subscribe))
        .route("/api/unsubscribe/:token", delete(unsubscribe))
        .route("/api/subscription/:token", get(subscription_info))
        .route("/api/topics", get(list_topics))
        .route("/api/newsletters/preview", get(newsletter_preview))
        .route("/api/newsletters/:id", get(newsletter_by_id))
        .route("/api/admin/stats", get(admin_stats))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub message: String,
    pub email: String,
    pub topics: Vec<String>,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub success: bool,
}

#[derive(Serialize)]
pub struct SubscriptionInfoResponse {
    pub email: String,
    pub topics: Vec<String>,
    pub active: bool,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct TopicsResponse {
    pub topics: Vec<&'static str>,
    pub display_names: BTreeMap<&'static str, &'static str>,
    pub descriptions: BTreeMap<&'static str, &'static str>,
}

#[derive(Deserialize)]
pub struct PreviewQuery {
    /// Comma-separated topic keys, e.g. "ai,us_politics".
    pub topics: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveEntryResponse {
    pub id: i64,
    pub topics: Vec<String>,
    pub title: String,
    pub content_html: String,
    pub sent_at: String,
    pub subscriber_count: i64,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub topics: Vec<String>,
    pub newsletters: Vec<ArchiveEntryResponse>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub topic_breakdown: BTreeMap<String, i64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "newsletter-api" }))
}

fn validate_topics(topic_keys: &[String]) -> Result<(), AppError> {
    if topic_keys.is_empty() {
        return Err(AppError::InvalidRequest(
            "At least one topic is required".to_string(),
        ));
    }
    if topic_keys.len() > MAX_TOPICS_PER_SUBSCRIPTION {
        return Err(AppError::InvalidRequest(format!(
            "At most {MAX_TOPICS_PER_SUBSCRIPTION} topics are allowed"
        )));
    }
    for key in topic_keys {
        if !topics::is_valid_key(key) {
            return Err(AppError::InvalidRequest(format!(
                "Invalid topic: {key}. Valid topics are: {:?}",
                topics::TOPICS.iter().map(|t| t.key).collect::<Vec<_>>()
            )));
        }
    }
    Ok(())
}

async fn subscribe(
    State(state): State<ApiState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, AppError> {
    let email_addr = req.email.trim().to_lowercase();
    if !email::is_valid_email(&email_addr) {
        return Err(AppError::InvalidRequest("Invalid email address".to_string()));
    }

    let mut topic_keys = req.topics;
    topic_keys.sort_unstable();
    topic_keys.dedup();
    validate_topics(&topic_keys)?;

    if let Some(existing) = db::get_by_email_and_topics(&state.pool, &email_addr, &topic_keys).await? {
        let message = if existing.active {
            "You're already subscribed to this topic combination!"
        } else {
            db::set_active(&state.pool, existing.id, true).await?;
            "Welcome back! Subscription reactivated."
        };
        return Ok(Json(SubscribeResponse {
            message: message.to_string(),
            email: email_addr,
            topics: topic_keys,
            success: true,
        }));
    }

    let subscription = db::create_subscription(&state.pool, &email_addr, &topic_keys).await?;

    // Confirmation mail is best-effort; a mail failure never fails signup.
    match PostmarkSender::new(&state.cfg) {
        Ok(sender) => {
            if let Err(e) = sender
                .send_confirmation_email(&email_addr, &topic_keys, &subscription.unsubscribe_token)
                .await
            {
                warn!("Failed to send confirmation email to {email_addr}: {e}");
            }
        }
        Err(e) => warn!("Confirmation email skipped: {e}"),
    }

    Ok(Json(SubscribeResponse {
        message: "Successfully subscribed to the newsletter!".to_string(),
        email: email_addr,
        topics: topic_keys,
        success: true,
    }))
}

async fn unsubscribe(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let subscription = db::get_by_token(&state.pool, &token)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid unsubscribe link".to_string()))?;

    let message = if subscription.active {
        db::set_active(&state.pool, subscription.id, false).await?;
        "Successfully unsubscribed from all newsletters."
    } else {
        "You are already unsubscribed."
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
        success: true,
    }))
}

async fn subscription_info(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Json<SubscriptionInfoResponse>, AppError> {
    let subscription = db::get_by_token(&state.pool, &token)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid link".to_string()))?;

    Ok(Json(SubscriptionInfoResponse {
        email: subscription.email,
        topics: subscription.topics,
        active: subscription.active,
        created_at: subscription.created_at.to_rfc3339(),
    }))
}

async fn list_topics() -> Json<TopicsResponse> {
    Json(TopicsResponse {
        topics: topics::TOPICS.iter().map(|t| t.key).collect(),
        display_names: topics::TOPICS.iter().map(|t| (t.key, t.display_name)).collect(),
        descriptions: topics::TOPICS.iter().map(|t| (t.key, t.description)).collect(),
    })
}

async fn newsletter_preview(
    State(state): State<ApiState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<PreviewResponse>, AppError> {
    let mut topic_keys: Vec<String> = query
        .topics
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    topic_keys.sort_unstable();
    topic_keys.dedup();
    validate_topics(&topic_keys)?;

    let limit = query.limit.unwrap_or(5).clamp(1, 50);
    let newsletters = db::newsletters_by_topics(&state.pool, &topic_keys, limit).await?;

    let entries: Vec<ArchiveEntryResponse> = newsletters
        .into_iter()
        .map(|n| ArchiveEntryResponse {
            id: n.id,
            topics: n.topics,
            title: n.title,
            content_html: n.content_html,
            sent_at: n.sent_at.to_rfc3339(),
            subscriber_count: n.subscriber_count,
        })
        .collect();

    Ok(Json(PreviewResponse {
        count: entries.len(),
        topics: topic_keys,
        newsletters: entries,
    }))
}

async fn newsletter_by_id(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let newsletter = db::newsletter_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Newsletter not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "id": newsletter.id,
        "topics": newsletter.topics,
        "title": newsletter.title,
        "content_html": newsletter.content_html,
        "content_markdown": newsletter.content_markdown,
        "sent_at": newsletter.sent_at.to_rfc3339(),
        "subscriber_count": newsletter.subscriber_count,
    })))
}

async fn admin_stats(
    State(state): State<ApiState>,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = db::subscription_stats(&state.pool).await?;
    Ok(Json(StatsResponse {
        total_subscriptions: stats.total_subscriptions,
        active_subscriptions: stats.active_subscriptions,
        topic_breakdown: stats.topic_breakdown.into_iter().collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_state() -> ApiState {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        ApiState {
            pool,
            cfg: Config::default(),
        }
    }

    fn subscribe_req(email: &str, topic_keys: &[&str]) -> SubscribeRequest {
        SubscribeRequest {
            email: email.to_string(),
            topics: topic_keys.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn subscribe_normalizes_email_and_sorts_topics() {
        let state = test_state().await;
        let res = subscribe(
            State(state.clone()),
            Json(subscribe_req("  User@Example.COM ", &["crypto", "ai"])),
        )
        .await
        .unwrap();

        assert_eq!(res.0.email, "user@example.com");
        assert_eq!(res.0.topics, vec!["ai", "crypto"]);
        assert!(res.0.message.starts_with("Successfully subscribed"));
    }

    #[tokio::test]
    async fn duplicate_subscribe_reports_existing() {
        let state = test_state().await;
        let req = || subscribe_req("a@example.com", &["ai"]);
        subscribe(State(state.clone()), Json(req())).await.unwrap();
        let second = subscribe(State(state.clone()), Json(req())).await.unwrap();
        assert!(second.0.message.contains("already subscribed"));
    }

    #[tokio::test]
    async fn unsubscribe_then_resubscribe_reactivates() {
        let state = test_state().await;
        subscribe(
            State(state.clone()),
            Json(subscribe_req("a@example.com", &["tech"])),
        )
        .await
        .unwrap();

        let token = db::get_by_email_and_topics(&state.pool, "a@example.com", &["tech".to_string()])
            .await
            .unwrap()
            .unwrap()
            .unsubscribe_token;

        let res = unsubscribe(State(state.clone()), Path(token.clone())).await.unwrap();
        assert!(res.0.message.contains("Successfully unsubscribed"));

        let again = unsubscribe(State(state.clone()), Path(token)).await.unwrap();
        assert!(again.0.message.contains("already unsubscribed"));

        let back = subscribe(
            State(state.clone()),
            Json(subscribe_req("a@example.com", &["tech"])),
        )
        .await
        .unwrap();
        assert!(back.0.message.contains("reactivated"));
    }

    #[tokio::test]
    async fn unsubscribe_with_unknown_token_is_not_found() {
        let state = test_state().await;
        let err = unsubscribe(State(state), Path("nope".to_string())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn subscribe_rejects_bad_input() {
        let state = test_state().await;

        let err = subscribe(
            State(state.clone()),
            Json(subscribe_req("not-an-email", &["ai"])),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        let err = subscribe(
            State(state.clone()),
            Json(subscribe_req("a@example.com", &[])),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        let err = subscribe(
            State(state),
            Json(subscribe_req("a@example.com", &["weather"])),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn preview_parses_and_validates_topic_list() {
        let state = test_state().await;
        db::archive_newsletter(
            &state.pool,
            &["ai".to_string(), "crypto".to_string()],
            "Weekly",
            "<p>hi</p>",
            "# hi",
            2,
        )
        .await
        .unwrap();

        let res = newsletter_preview(
            State(state.clone()),
            Query(PreviewQuery {
                topics: "Crypto, ai".to_string(),
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(res.0.count, 1);
        assert_eq!(res.0.topics, vec!["ai", "crypto"]);
        assert_eq!(res.0.newsletters[0].title, "Weekly");

        let err = newsletter_preview(
            State(state),
            Query(PreviewQuery {
                topics: "weather".to_string(),
                limit: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
