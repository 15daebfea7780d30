use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, DatabaseError};

/// Authors that never count as contacts.
pub const EXCLUDED_AUTHORS: [&str; 2] = ["[deleted]", "AutoModerator"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub author: String,
    pub subreddit: String,
    pub url: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: i64,
    pub viability_score: f64,
    pub is_emerging: bool,
    pub trend_direction: TrendDirection,
}

impl RedditPost {
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created_utc, 0).unwrap_or_default()
    }

    /// Title and body joined for keyword scans.
    pub fn full_text(&self) -> String {
        match &self.content {
            Some(body) => format!("{} {}", self.title, body),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    #[default]
    Stable,
    Declining,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Rising => "rising",
            TrendDirection::Stable => "stable",
            TrendDirection::Declining => "declining",
        }
    }
}

impl FromStr for TrendDirection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rising" => Ok(TrendDirection::Rising),
            "stable" => Ok(TrendDirection::Stable),
            "declining" => Ok(TrendDirection::Declining),
            other => Err(corrupt("reddit_posts", format!("trend_direction '{other}'"))),
        }
    }
}

/// Profile of a Reddit author as returned by `/user/{name}/about`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedditProfile {
    pub username: String,
    pub link_karma: i64,
    pub comment_karma: i64,
    pub created_utc: i64,
}

impl RedditProfile {
    pub fn total_karma(&self) -> i64 {
        self.link_karma + self.comment_karma
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedditContact {
    pub pain_point_id: String,
    pub username: String,
    pub karma: i64,
    pub account_age_days: i64,
    pub posting_frequency: f64,
    pub engagement_score: f64,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Active,
    Paused,
    PastDue,
    Cancelled,
    Completed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SubscriptionStatus::None),
            "active" => Ok(SubscriptionStatus::Active),
            "paused" => Ok(SubscriptionStatus::Paused),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "completed" => Ok(SubscriptionStatus::Completed),
            other => Err(corrupt("subscriptions", format!("status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub id: String,
    pub user_id: Option<String>,
    pub subscription_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub error_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Received => "received",
            WebhookEventStatus::Processing => "processing",
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Failed => "failed",
        }
    }
}

impl FromStr for WebhookEventStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(WebhookEventStatus::Received),
            "processing" => Ok(WebhookEventStatus::Processing),
            "processed" => Ok(WebhookEventStatus::Processed),
            "failed" => Ok(WebhookEventStatus::Failed),
            other => Err(corrupt("webhook_events", format!("status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub status: WebhookEventStatus,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    pub fn processed(&self) -> bool {
        self.status == WebhookEventStatus::Processed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub plan_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartupIdea {
    pub id: String,
    pub user_id: String,
    pub pain_point_id: Option<String>,
    pub title: String,
    pub description: String,
    pub problem: String,
    pub solution: String,
    pub target_market: String,
    pub revenue_model: String,
    pub validation: Option<IdeaValidation>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdeaValidation {
    pub market_score: f64,
    pub competition_score: f64,
    pub feasibility_score: f64,
    pub overall_score: f64,
    pub strengths: Vec<String>,
    pub risks: Vec<String>,
    pub recommendation: String,
    /// True when the scores came from the heuristic fallback rather than the model.
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    LandingPage,
    TweetThread,
    Email,
    BlogPost,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::LandingPage => "landing_page",
            ContentKind::TweetThread => "tweet_thread",
            ContentKind::Email => "email",
            ContentKind::BlogPost => "blog_post",
        }
    }
}

impl FromStr for ContentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "landing_page" => Ok(ContentKind::LandingPage),
            "tweet_thread" => Ok(ContentKind::TweetThread),
            "email" => Ok(ContentKind::Email),
            "blog_post" => Ok(ContentKind::BlogPost),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown content kind '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    pub id: String,
    pub user_id: String,
    pub idea_id: String,
    pub kind: ContentKind,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Draft,
    Sent,
    Failed,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::Draft => "draft",
            SendStatus::Sent => "sent",
            SendStatus::Failed => "failed",
        }
    }
}

impl FromStr for SendStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SendStatus::Draft),
            "sent" => Ok(SendStatus::Sent),
            "failed" => Ok(SendStatus::Failed),
            other => Err(corrupt("messages", format!("send_status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageOutcome {
    Replied,
    CallScheduled,
    CustomerAcquired,
    DeadEnd,
}

impl MessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOutcome::Replied => "replied",
            MessageOutcome::CallScheduled => "call_scheduled",
            MessageOutcome::CustomerAcquired => "customer_acquired",
            MessageOutcome::DeadEnd => "dead_end",
        }
    }

    /// Every outcome except a dead end means the contact answered.
    pub fn is_reply(&self) -> bool {
        !matches!(self, MessageOutcome::DeadEnd)
    }
}

impl FromStr for MessageOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replied" => Ok(MessageOutcome::Replied),
            "call_scheduled" => Ok(MessageOutcome::CallScheduled),
            "customer_acquired" => Ok(MessageOutcome::CustomerAcquired),
            "dead_end" => Ok(MessageOutcome::DeadEnd),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown message outcome '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub pain_point_id: String,
    pub contact_username: String,
    pub template_variant: String,
    pub body: String,
    pub send_status: SendStatus,
    pub outcome: Option<MessageOutcome>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariantStats {
    pub template_variant: String,
    pub sent: i64,
    pub replies: i64,
    pub reply_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimits {
    pub user_id: String,
    pub period: String,
    pub ideas_generated: i64,
    pub content_generated: i64,
    pub contacts_discovered: i64,
}

fn corrupt(table: &str, details: String) -> CoreError {
    CoreError::Database(DatabaseError::CorruptRow {
        table: table.to_string(),
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_status_round_trips_through_str() {
        for status in [
            SubscriptionStatus::None,
            SubscriptionStatus::Active,
            SubscriptionStatus::Paused,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert!("halted".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn full_text_joins_title_and_body() {
        let post = RedditPost {
            id: "abc".to_string(),
            title: "Struggling with invoices".to_string(),
            content: Some("every month it's a nightmare".to_string()),
            author: "someone".to_string(),
            subreddit: "smallbusiness".to_string(),
            url: "https://reddit.com/r/smallbusiness/abc".to_string(),
            score: 10,
            num_comments: 2,
            created_utc: 1_700_000_000,
            viability_score: 0.0,
            is_emerging: false,
            trend_direction: TrendDirection::Stable,
        };
        assert_eq!(
            post.full_text(),
            "Struggling with invoices every month it's a nightmare"
        );
    }

    #[test]
    fn dead_end_is_not_a_reply() {
        assert!(!MessageOutcome::DeadEnd.is_reply());
        assert!(MessageOutcome::CallScheduled.is_reply());
    }
}
