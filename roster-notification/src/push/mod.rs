//! Best-effort web push delivery.
//!
//! Every subscription of a user is attempted concurrently and the attempts are
//! joined once all of them settle. Endpoints the provider reports as gone are
//! pruned; any other failure is logged and dropped. Nothing here returns an
//! error to the caller: the persisted notification is the durable record.

pub mod relay;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use roster_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{NewPushSubscription, PushPayload, PushSubscription, SubscribeRequest};
use crate::store::SubscriptionStore;

/// Why a single push attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushFailure {
    /// The provider no longer knows this endpoint (404 / 410).
    #[error("push endpoint is permanently invalid (status {status})")]
    PermanentlyInvalidEndpoint { status: u16 },
    #[error("transient push failure: {0}")]
    Transient(String),
}

/// Outbound push provider.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> Result<(), PushFailure>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub pruned: usize,
    pub failed: usize,
}

pub struct PushDelivery {
    subscriptions: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn PushTransport>,
    attempt_timeout: Duration,
}

impl PushDelivery {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn PushTransport>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            subscriptions,
            transport,
            attempt_timeout,
        }
    }

    /// Register a device, replacing whatever was stored for the same endpoint.
    pub fn subscribe(&self, user_id: Uuid, req: SubscribeRequest) -> AppResult<PushSubscription> {
        req.validate()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

        let subscription = self.subscriptions.upsert(NewPushSubscription {
            user_id,
            endpoint: req.endpoint,
            auth_key: req.keys.auth,
            p256dh_key: req.keys.p256dh,
            updated_at: Utc::now(),
        })?;

        tracing::info!(user_id = %user_id, subscription_id = %subscription.id, "push subscription registered");
        Ok(subscription)
    }

    pub fn subscriptions(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>> {
        self.subscriptions.for_user(user_id)
    }

    pub fn unsubscribe(&self, user_id: Uuid, endpoint: &str) -> AppResult<()> {
        if !self.subscriptions.delete_for_user(user_id, endpoint)? {
            return Err(AppError::new(ErrorCode::SubscriptionNotFound, "push subscription not found"));
        }
        tracing::info!(user_id = %user_id, "push subscription removed");
        Ok(())
    }

    pub async fn deliver(&self, user_id: Uuid, payload: &PushPayload) -> DeliveryReport {
        let subscriptions = match self.subscriptions.for_user(user_id) {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(error = %e, user_id = %user_id, "failed to load push subscriptions");
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport {
            attempted: subscriptions.len(),
            ..DeliveryReport::default()
        };
        if subscriptions.is_empty() {
            return report;
        }

        let attempts = subscriptions.iter().map(|sub| self.attempt(sub, payload));
        let outcomes = join_all(attempts).await;

        for (sub, outcome) in subscriptions.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(PushFailure::PermanentlyInvalidEndpoint { status }) => {
                    tracing::info!(
                        user_id = %user_id,
                        subscription_id = %sub.id,
                        status,
                        "pruning expired push subscription"
                    );
                    match self.subscriptions.delete_by_endpoint(&sub.endpoint) {
                        Ok(_) => report.pruned += 1,
                        Err(e) => {
                            tracing::error!(error = %e, subscription_id = %sub.id, "failed to prune push subscription");
                            report.failed += 1;
                        }
                    }
                }
                Err(failure) => {
                    tracing::warn!(
                        user_id = %user_id,
                        subscription_id = %sub.id,
                        error = %failure,
                        "push delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            user_id = %user_id,
            attempted = report.attempted,
            delivered = report.delivered,
            pruned = report.pruned,
            failed = report.failed,
            "push delivery settled"
        );
        report
    }

    async fn attempt(&self, sub: &PushSubscription, payload: &PushPayload) -> Result<(), PushFailure> {
        match tokio::time::timeout(self.attempt_timeout, self.transport.send(sub, payload)).await {
            Ok(result) => result,
            Err(_) => Err(PushFailure::Transient(format!(
                "timed out after {}ms",
                self.attempt_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemorySubscriptionStore, ScriptedTransport, TransportScript};
    use crate::models::SubscriptionKeys;

    fn request(endpoint: &str) -> SubscribeRequest {
        SubscribeRequest {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                auth: "auth".into(),
                p256dh: "p256dh".into(),
            },
        }
    }

    fn payload() -> PushPayload {
        PushPayload {
            title: "Checked in".into(),
            body: "You checked in at 09:05".into(),
            url: "/attendance".into(),
        }
    }

    fn delivery(transport: Arc<ScriptedTransport>) -> (Arc<MemorySubscriptionStore>, PushDelivery) {
        let store = Arc::new(MemorySubscriptionStore::default());
        let delivery = PushDelivery::new(store.clone(), transport, Duration::from_millis(200));
        (store, delivery)
    }

    #[tokio::test]
    async fn no_subscriptions_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_, delivery) = delivery(transport.clone());

        let report = delivery.deliver(Uuid::new_v4(), &payload()).await;
        assert_eq!(report, DeliveryReport::default());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn subscribing_twice_with_one_endpoint_keeps_one_row() {
        let (store, delivery) = delivery(Arc::new(ScriptedTransport::default()));
        let user = Uuid::new_v4();

        delivery.subscribe(user, request("https://push.example.com/a")).unwrap();
        delivery.subscribe(user, request("https://push.example.com/a")).unwrap();
        delivery.subscribe(user, request("https://push.example.com/b")).unwrap();

        assert_eq!(store.for_user(user).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_subscription_is_rejected() {
        let (_, delivery) = delivery(Arc::new(ScriptedTransport::default()));
        let err = delivery.subscribe(Uuid::new_v4(), request("nope")).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ValidationError));
    }

    #[tokio::test]
    async fn gone_endpoints_are_pruned_and_others_kept() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script("https://push.example.com/gone", TransportScript::Gone);
        transport.script("https://push.example.com/flaky", TransportScript::Transient);
        let (_, delivery) = delivery(transport.clone());
        let user = Uuid::new_v4();

        for endpoint in ["ok", "gone", "flaky"] {
            delivery
                .subscribe(user, request(&format!("https://push.example.com/{endpoint}")))
                .unwrap();
        }

        let report = delivery.deliver(user, &payload()).await;
        assert_eq!(
            report,
            DeliveryReport { attempted: 3, delivered: 1, pruned: 1, failed: 1 }
        );
        assert_eq!(transport.sent().len(), 3);

        let remaining: Vec<_> = delivery
            .subscriptions(user)
            .unwrap()
            .into_iter()
            .map(|s| s.endpoint)
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&"https://push.example.com/gone".to_string()));
    }

    #[tokio::test]
    async fn slow_provider_times_out_without_pruning() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.script("https://push.example.com/slow", TransportScript::Hang);
        let (_, delivery) = delivery(transport);
        let user = Uuid::new_v4();
        delivery.subscribe(user, request("https://push.example.com/slow")).unwrap();
        delivery.subscribe(user, request("https://push.example.com/fast")).unwrap();

        let report = delivery.deliver(user, &payload()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.pruned, 0);
        assert_eq!(delivery.subscriptions(user).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_only_touches_own_endpoints() {
        let (_, delivery) = delivery(Arc::new(ScriptedTransport::default()));
        let owner = Uuid::new_v4();
        delivery.subscribe(owner, request("https://push.example.com/mine")).unwrap();

        let err = delivery
            .unsubscribe(Uuid::new_v4(), "https://push.example.com/mine")
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::SubscriptionNotFound));

        delivery.unsubscribe(owner, "https://push.example.com/mine").unwrap();
        assert!(delivery.subscriptions(owner).unwrap().is_empty());
    }
}
