use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use roster_shared::clients::db::{checkout, DbPool};
use roster_shared::errors::{AppError, AppResult};

use crate::models::{
    NewNotification, NewPushSubscription, Notification, NotificationChanges, NotificationType,
    PushSubscription,
};
use crate::schema::{notifications, push_subscriptions};

/// Per-user notification persistence. Every mutation is scoped to the owning user.
pub trait NotificationStore: Send + Sync {
    fn insert(&self, new: NewNotification) -> AppResult<Notification>;
    fn list_for_user(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>>;
    fn count_unread(&self, user_id: Uuid) -> AppResult<i64>;
    fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Notification>>;
    fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize>;
    fn update(&self, id: Uuid, user_id: Uuid, changes: &NotificationChanges) -> AppResult<Option<Notification>>;
    fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<bool>;
    fn delete_all(&self, user_id: Uuid) -> AppResult<usize>;
}

/// Push subscriptions, unique by endpoint.
pub trait SubscriptionStore: Send + Sync {
    fn upsert(&self, new: NewPushSubscription) -> AppResult<PushSubscription>;
    fn for_user(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>>;
    fn delete_by_endpoint(&self, endpoint: &str) -> AppResult<bool>;
    fn delete_for_user(&self, user_id: Uuid, endpoint: &str) -> AppResult<bool>;
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = notifications)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    message: String,
    notification_type: String,
    is_read: bool,
    action_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let notification_type = row
            .notification_type
            .parse::<NotificationType>()
            .map_err(|e| AppError::internal(format!("corrupt notification row {}: {e}", row.id)))?;
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            notification_type,
            read: row.is_read,
            action_url: row.action_url,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
struct NewNotificationRow<'a> {
    user_id: Uuid,
    title: &'a str,
    message: &'a str,
    notification_type: &'a str,
    action_url: Option<&'a str>,
    created_at: DateTime<Utc>,
}

pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl NotificationStore for PgNotificationStore {
    fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        let mut conn = checkout(&self.pool)?;
        let row = NewNotificationRow {
            user_id: new.user_id,
            title: &new.draft.title,
            message: &new.draft.message,
            notification_type: new.draft.notification_type.as_str(),
            action_url: new.draft.action_url.as_deref(),
            created_at: new.created_at,
        };

        diesel::insert_into(notifications::table)
            .values(&row)
            .returning(NotificationRow::as_returning())
            .get_result(&mut conn)?
            .try_into()
    }

    fn list_for_user(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>> {
        let mut conn = checkout(&self.pool)?;
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order(notifications::created_at.desc())
            .limit(limit)
            .select(NotificationRow::as_select())
            .load(&mut conn)?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    fn count_unread(&self, user_id: Uuid) -> AppResult<i64> {
        let mut conn = checkout(&self.pool)?;
        let count = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(&mut conn)?;
        Ok(count)
    }

    fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Notification>> {
        let mut conn = checkout(&self.pool)?;
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::is_read.eq(true))
        .returning(NotificationRow::as_returning())
        .get_result(&mut conn)
        .optional()?
        .map(Notification::try_from)
        .transpose()
    }

    fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize> {
        let mut conn = checkout(&self.pool)?;
        let updated = diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)?;
        Ok(updated)
    }

    fn update(&self, id: Uuid, user_id: Uuid, changes: &NotificationChanges) -> AppResult<Option<Notification>> {
        let mut conn = checkout(&self.pool)?;
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(changes)
        .returning(NotificationRow::as_returning())
        .get_result(&mut conn)
        .optional()?
        .map(Notification::try_from)
        .transpose()
    }

    fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut conn = checkout(&self.pool)?;
        let deleted = diesel::delete(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn delete_all(&self, user_id: Uuid) -> AppResult<usize> {
        let mut conn = checkout(&self.pool)?;
        let deleted = diesel::delete(notifications::table.filter(notifications::user_id.eq(user_id)))
            .execute(&mut conn)?;
        Ok(deleted)
    }
}

pub struct PgSubscriptionStore {
    pool: DbPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl SubscriptionStore for PgSubscriptionStore {
    fn upsert(&self, new: NewPushSubscription) -> AppResult<PushSubscription> {
        let mut conn = checkout(&self.pool)?;
        let subscription = diesel::insert_into(push_subscriptions::table)
            .values(&new)
            .on_conflict(push_subscriptions::endpoint)
            .do_update()
            .set(&new)
            .returning(PushSubscription::as_returning())
            .get_result(&mut conn)?;
        Ok(subscription)
    }

    fn for_user(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>> {
        let mut conn = checkout(&self.pool)?;
        let subscriptions = push_subscriptions::table
            .filter(push_subscriptions::user_id.eq(user_id))
            .order(push_subscriptions::created_at.asc())
            .select(PushSubscription::as_select())
            .load(&mut conn)?;
        Ok(subscriptions)
    }

    fn delete_by_endpoint(&self, endpoint: &str) -> AppResult<bool> {
        let mut conn = checkout(&self.pool)?;
        let deleted = diesel::delete(push_subscriptions::table.filter(push_subscriptions::endpoint.eq(endpoint)))
            .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn delete_for_user(&self, user_id: Uuid, endpoint: &str) -> AppResult<bool> {
        let mut conn = checkout(&self.pool)?;
        let deleted = diesel::delete(
            push_subscriptions::table
                .filter(push_subscriptions::user_id.eq(user_id))
                .filter(push_subscriptions::endpoint.eq(endpoint)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }
}
