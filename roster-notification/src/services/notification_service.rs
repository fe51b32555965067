use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use roster_shared::audit::{self, actions, ActivityLog, NewActivity};
use roster_shared::clock::Clock;
use roster_shared::directory::{self, MemberDirectory};
use roster_shared::errors::{AppError, AppResult, ErrorCode};
use roster_shared::types::auth::AuthUser;

use crate::models::{NewNotification, Notification, NotificationChanges, NotificationDraft, PushPayload};
use crate::push::PushDelivery;
use crate::store::NotificationStore;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

/// Notification inbox plus its push side channel.
pub struct NotificationService {
    pub(crate) store: Arc<dyn NotificationStore>,
    pub(crate) push: Arc<PushDelivery>,
    pub(crate) directory: Arc<dyn MemberDirectory>,
    pub(crate) activity: Arc<dyn ActivityLog>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        push: Arc<PushDelivery>,
        directory: Arc<dyn MemberDirectory>,
        activity: Arc<dyn ActivityLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            push,
            directory,
            activity,
            clock,
        }
    }

    pub fn push(&self) -> &PushDelivery {
        &self.push
    }

    /// Persist a notification for one user, then push it to their devices.
    ///
    /// Push delivery is awaited but cannot fail this call; only the store write can.
    pub async fn create(&self, user_id: Uuid, draft: NotificationDraft) -> AppResult<Notification> {
        draft
            .validate()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

        let notification = self.store.insert(NewNotification {
            user_id,
            draft,
            created_at: self.clock.now(),
        })?;

        tracing::debug!(
            notification_id = %notification.id,
            user_id = %user_id,
            notification_type = %notification.notification_type,
            "notification created"
        );

        self.push.deliver(user_id, &PushPayload::from(&notification)).await;
        Ok(notification)
    }

    /// Send a notification from one member to another member of the same company.
    pub async fn notify(&self, actor: &AuthUser, recipient_id: Uuid, draft: NotificationDraft) -> AppResult<Notification> {
        let recipient = directory::resolve(self.directory.as_ref(), recipient_id)?;
        if recipient.company_id != actor.company_id {
            return Err(AppError::new(ErrorCode::CompanyMismatch, "recipient belongs to another company"));
        }

        let title = draft.title.clone();
        let notification = self.create(recipient.id, draft).await?;

        audit::record(
            self.activity.as_ref(),
            NewActivity::new(
                actor.id,
                actor.company_id,
                actions::SEND_NOTIFICATION,
                format!("Sent \"{title}\" to {}", recipient.display_name),
            )
            .with_metadata(serde_json::json!({
                "notification_id": notification.id,
                "recipient_id": recipient.id,
            })),
        );

        Ok(notification)
    }

    /// Newest first.
    pub fn list(&self, user_id: Uuid, limit: Option<i64>) -> AppResult<Vec<Notification>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        self.store.list_for_user(user_id, limit)
    }

    pub fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        self.store.count_unread(user_id)
    }

    pub fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<Notification> {
        self.store.mark_read(id, user_id)?.ok_or_else(not_found)
    }

    pub fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize> {
        self.store.mark_all_read(user_id)
    }

    pub fn update(&self, id: Uuid, user_id: Uuid, changes: NotificationChanges) -> AppResult<Notification> {
        if changes.is_empty() {
            return Err(AppError::Validation("nothing to update".into()));
        }
        changes
            .validate()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
        self.store.update(id, user_id, &changes)?.ok_or_else(not_found)
    }

    pub fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        if !self.store.delete(id, user_id)? {
            return Err(not_found());
        }
        Ok(())
    }

    pub fn delete_all(&self, user_id: Uuid) -> AppResult<usize> {
        let deleted = self.store.delete_all(user_id)?;
        tracing::info!(user_id = %user_id, deleted, "notifications cleared");
        Ok(deleted)
    }
}

fn not_found() -> AppError {
    AppError::new(ErrorCode::NotificationNotFound, "notification not found")
}
