use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use roster_shared::errors::AppResult;
use roster_shared::types::api::ApiResponse;
use roster_shared::types::auth::AuthUser;

use crate::models::{PushSubscription, SubscribeRequest};
use crate::services::NotificationService;

/// GET /push/subscriptions
pub async fn list_subscriptions(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<PushSubscription>>>> {
    let subscriptions = service.push().subscriptions(auth_user.id)?;
    Ok(Json(ApiResponse::ok(subscriptions)))
}

/// POST /push/subscriptions
pub async fn subscribe(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
    Json(req): Json<SubscribeRequest>,
) -> AppResult<Json<ApiResponse<PushSubscription>>> {
    let subscription = service.push().subscribe(auth_user.id, req)?;
    Ok(Json(ApiResponse::ok(subscription)))
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

/// DELETE /push/subscriptions
pub async fn unsubscribe(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
    Json(req): Json<UnsubscribeRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    service.push().unsubscribe(auth_user.id, &req.endpoint)?;
    Ok(Json(ApiResponse::ok(())))
}
