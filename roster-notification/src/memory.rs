//! In-memory stores and a scripted push transport for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use roster_shared::errors::{AppError, AppResult};

use crate::models::{
    NewNotification, NewPushSubscription, Notification, NotificationChanges, PushPayload,
    PushSubscription,
};
use crate::push::{PushFailure, PushTransport};
use crate::store::{NotificationStore, SubscriptionStore};

#[derive(Default)]
pub struct MemoryNotificationStore {
    rows: Mutex<Vec<Notification>>,
    failing_users: Mutex<HashSet<Uuid>>,
    offline: Mutex<bool>,
}

impl MemoryNotificationStore {
    /// Make inserts for this recipient fail.
    pub fn fail_for(&self, user_id: Uuid) {
        self.failing_users.lock().unwrap().insert(user_id);
    }

    /// Make every insert fail.
    pub fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }

    pub fn all(&self) -> Vec<Notification> {
        self.rows.lock().unwrap().clone()
    }

    fn owned<F, T>(&self, id: Uuid, user_id: Uuid, f: F) -> Option<T>
    where
        F: FnOnce(&mut Notification) -> T,
    {
        let mut rows = self.rows.lock().unwrap();
        rows.iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(f)
    }
}

impl NotificationStore for MemoryNotificationStore {
    fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        if *self.offline.lock().unwrap() || self.failing_users.lock().unwrap().contains(&new.user_id) {
            return Err(AppError::internal("notification store unavailable"));
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.draft.title,
            message: new.draft.message,
            notification_type: new.draft.notification_type,
            read: false,
            action_url: new.draft.action_url,
            created_at: new.created_at,
        };
        self.rows.lock().unwrap().push(notification.clone());
        Ok(notification)
    }

    fn list_for_user(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>> {
        let rows = self.rows.lock().unwrap();
        let mut mine: Vec<_> = rows.iter().rev().filter(|n| n.user_id == user_id).cloned().collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mine.truncate(limit.max(0) as usize);
        Ok(mine)
    }

    fn count_unread(&self, user_id: Uuid) -> AppResult<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|n| n.user_id == user_id && !n.read).count() as i64)
    }

    fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Notification>> {
        Ok(self.owned(id, user_id, |n| {
            n.read = true;
            n.clone()
        }))
    }

    fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize> {
        let mut rows = self.rows.lock().unwrap();
        let mut updated = 0;
        for n in rows.iter_mut().filter(|n| n.user_id == user_id && !n.read) {
            n.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    fn update(&self, id: Uuid, user_id: Uuid, changes: &NotificationChanges) -> AppResult<Option<Notification>> {
        Ok(self.owned(id, user_id, |n| {
            if let Some(title) = &changes.title {
                n.title = title.clone();
            }
            if let Some(message) = &changes.message {
                n.message = message.clone();
            }
            n.clone()
        }))
    }

    fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| !(n.id == id && n.user_id == user_id));
        Ok(rows.len() < before)
    }

    fn delete_all(&self, user_id: Uuid) -> AppResult<usize> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| n.user_id != user_id);
        Ok(before - rows.len())
    }
}

#[derive(Default)]
pub struct MemorySubscriptionStore {
    by_endpoint: Mutex<HashMap<String, PushSubscription>>,
}

impl SubscriptionStore for MemorySubscriptionStore {
    fn upsert(&self, new: NewPushSubscription) -> AppResult<PushSubscription> {
        let mut map = self.by_endpoint.lock().unwrap();
        let subscription = match map.get(&new.endpoint) {
            Some(existing) => PushSubscription {
                user_id: new.user_id,
                auth_key: new.auth_key,
                p256dh_key: new.p256dh_key,
                updated_at: new.updated_at,
                ..existing.clone()
            },
            None => PushSubscription {
                id: Uuid::new_v4(),
                user_id: new.user_id,
                endpoint: new.endpoint.clone(),
                auth_key: new.auth_key,
                p256dh_key: new.p256dh_key,
                created_at: Utc::now(),
                updated_at: new.updated_at,
            },
        };
        map.insert(new.endpoint, subscription.clone());
        Ok(subscription)
    }

    fn for_user(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>> {
        let map = self.by_endpoint.lock().unwrap();
        let mut subs: Vec<_> = map.values().filter(|s| s.user_id == user_id).cloned().collect();
        subs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(subs)
    }

    fn delete_by_endpoint(&self, endpoint: &str) -> AppResult<bool> {
        Ok(self.by_endpoint.lock().unwrap().remove(endpoint).is_some())
    }

    fn delete_for_user(&self, user_id: Uuid, endpoint: &str) -> AppResult<bool> {
        let mut map = self.by_endpoint.lock().unwrap();
        match map.get(endpoint) {
            Some(sub) if sub.user_id == user_id => {
                map.remove(endpoint);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Outcome a [`ScriptedTransport`] produces for an endpoint.
#[derive(Debug, Clone, Copy)]
pub enum TransportScript {
    Deliver,
    Gone,
    Transient,
    /// Never answers; exercises the per-attempt timeout.
    Hang,
}

/// Push transport whose answers are scripted per endpoint. Unscripted endpoints deliver.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, TransportScript>>,
    sent: Mutex<Vec<(String, PushPayload)>>,
}

impl ScriptedTransport {
    pub fn script(&self, endpoint: &str, outcome: TransportScript) {
        self.scripts.lock().unwrap().insert(endpoint.to_string(), outcome);
    }

    /// Every (endpoint, payload) the transport was asked to send.
    pub fn sent(&self) -> Vec<(String, PushPayload)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> Result<(), PushFailure> {
        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.clone()));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&subscription.endpoint)
            .copied()
            .unwrap_or(TransportScript::Deliver);

        match script {
            TransportScript::Deliver => Ok(()),
            TransportScript::Gone => Err(PushFailure::PermanentlyInvalidEndpoint { status: 410 }),
            TransportScript::Transient => Err(PushFailure::Transient("HTTP 503".into())),
            TransportScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}
