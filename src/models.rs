//! Row types for the relational schema in `migrations/`.
//!
//! Users are keyed by the identity provider's user id. Everything else hangs
//! off a user and is removed with it; platform rows are a static lookup table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Billing state of a user, matching `subscription_status_enum`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "subscription_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Free,
    Premium,
    Trial,
    Cancelled,
    PastDue,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Premium => "premium",
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::PastDue => "past_due",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(SubscriptionStatus::Free),
            "premium" => Some(SubscriptionStatus::Premium),
            "trial" => Some(SubscriptionStatus::Trial),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "past_due" => Some(SubscriptionStatus::PastDue),
            _ => None,
        }
    }
}

/// Matches `content_type_enum`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "content_type_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Image,
    Video,
    Carousel,
    TextOnly,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Carousel => "carousel",
            ContentType::TextOnly => "text_only",
        }
    }
}

/// Matches `schedule_status_enum`. Nothing in this service moves a post
/// between states; the column is written by whatever publishes posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, Default)]
#[sqlx(type_name = "schedule_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    #[default]
    Pending,
    Processing,
    Posted,
    Failed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Processing => "processing",
            ScheduleStatus::Posted => "posted",
            ScheduleStatus::Failed => "failed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }
}

/// Local mirror of an identity-provider user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub clerk_user_id: String,
    pub email: String,
    pub subscription_status: Option<SubscriptionStatus>,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SocialPlatform {
    pub id: i32,
    pub name: String,
    pub api_base_url: Option<String>,
    pub icon_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user's linked account on one platform.
///
/// Unique per (`user_id`, `platform_id`, `platform_user_id`). Tokens arrive
/// already encrypted and are never serialized.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserConnectedAccount {
    pub id: Uuid,
    pub user_id: String,
    pub platform_id: i32,
    pub platform_user_id: String,
    pub username_on_platform: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub scopes: Option<serde_json::Value>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContentItem {
    pub id: Uuid,
    pub user_id: String,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub content_type: ContentType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored file of a content item, ordered within a carousel
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MediaAsset {
    pub id: Uuid,
    pub content_item_id: Uuid,
    pub user_id: String,
    pub storage_path: String,
    pub file_name: Option<String>,
    pub mime_type: String,
    pub file_size_bytes: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub order_in_carousel: i32,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScheduledPost {
    pub id: Uuid,
    pub user_id: String,
    pub content_item_id: Uuid,
    pub connected_account_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub posted_at: Option<DateTime<Utc>>,
    pub platform_post_id: Option<String>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub platform_specific_options: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Connected account joined with its platform name, for display
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConnectedAccountSummary {
    pub id: Uuid,
    pub platform_name: String,
    pub username_on_platform: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// A pending post joined with the content it publishes
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UpcomingPost {
    pub id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub title: Option<String>,
    pub content_type: ContentType,
    pub platform_name: String,
}
