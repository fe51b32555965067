use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::push_subscriptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Attendance,
    Announcement,
    Reminder,
    Leave,
    Info,
    Success,
    Error,
    Warning,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Attendance => "attendance",
            NotificationType::Announcement => "announcement",
            NotificationType::Reminder => "reminder",
            NotificationType::Leave => "leave",
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Error => "error",
            NotificationType::Warning => "warning",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attendance" => Ok(NotificationType::Attendance),
            "announcement" => Ok(NotificationType::Announcement),
            "reminder" => Ok(NotificationType::Reminder),
            "leave" => Ok(NotificationType::Leave),
            "info" => Ok(NotificationType::Info),
            "success" => Ok(NotificationType::Success),
            "error" => Ok(NotificationType::Error),
            "warning" => Ok(NotificationType::Warning),
            _ => Err(format!("unknown notification type: {s}")),
        }
    }
}

/// A notification addressed to exactly one user.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub read: bool,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Content of a notification before a recipient is chosen.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NotificationDraft {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    #[serde(rename = "type", default = "default_type")]
    pub notification_type: NotificationType,
    pub action_url: Option<String>,
}

fn default_type() -> NotificationType {
    NotificationType::Info
}

impl NotificationDraft {
    pub fn new(notification_type: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            notification_type,
            action_url: None,
        }
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub draft: NotificationDraft,
    pub created_at: DateTime<Utc>,
}

/// Editable notification content. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate, AsChangeset)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NotificationChanges {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: Option<String>,
}

impl NotificationChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.message.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = push_subscriptions)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub auth_key: String,
    #[serde(skip_serializing)]
    pub p256dh_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = push_subscriptions)]
pub struct NewPushSubscription {
    pub user_id: Uuid,
    pub endpoint: String,
    pub auth_key: String,
    pub p256dh_key: String,
    pub updated_at: DateTime<Utc>,
}

/// Browser `PushSubscription.toJSON()` shape.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(url(message = "endpoint must be a URL"))]
    pub endpoint: String,
    #[validate]
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubscriptionKeys {
    #[validate(length(min = 1, message = "auth key is required"))]
    pub auth: String,
    #[validate(length(min = 1, message = "p256dh key is required"))]
    pub p256dh: String,
}

/// JSON body handed to the push transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl From<&Notification> for PushPayload {
    fn from(n: &Notification) -> Self {
        Self {
            title: n.title.clone(),
            body: n.message.clone(),
            url: n.action_url.clone().unwrap_or_else(|| "/notifications".to_string()),
        }
    }
}
