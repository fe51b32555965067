pub mod notifications;
pub mod push;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::services::NotificationService;

/// Notification inbox and push subscription routes.
pub fn router() -> Router<Arc<NotificationService>> {
    Router::new()
        .route(
            "/notifications",
            get(notifications::list_notifications)
                .post(notifications::notify)
                .delete(notifications::delete_all_notifications),
        )
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/broadcast", post(notifications::broadcast))
        .route("/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route(
            "/notifications/:id",
            patch(notifications::update_notification).delete(notifications::delete_notification),
        )
        .route(
            "/push/subscriptions",
            get(push::list_subscriptions)
                .post(push::subscribe)
                .delete(push::unsubscribe),
        )
}
