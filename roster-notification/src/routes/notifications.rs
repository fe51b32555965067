use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use roster_shared::errors::AppResult;
use roster_shared::middleware::CompanyAdmin;
use roster_shared::types::api::ApiResponse;
use roster_shared::types::auth::{AuthUser, UserRole};

use crate::models::{Notification, NotificationChanges, NotificationDraft};
use crate::services::{BroadcastReport, NotificationService};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// GET /notifications
pub async fn list_notifications(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ApiResponse<Vec<Notification>>>> {
    let items = service.list(auth_user.id, params.limit)?;
    Ok(Json(ApiResponse::ok(items)))
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let count = service.unread_count(auth_user.id)?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub draft: NotificationDraft,
}

/// POST /notifications
/// Send a notification to a single member of the caller's company.
pub async fn notify(
    State(service): State<Arc<NotificationService>>,
    CompanyAdmin(admin): CompanyAdmin,
    Json(req): Json<NotifyRequest>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = service.notify(&admin, req.user_id, req.draft).await?;
    Ok(Json(ApiResponse::ok(notification)))
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(flatten)]
    pub draft: NotificationDraft,
}

/// POST /notifications/broadcast
pub async fn broadcast(
    State(service): State<Arc<NotificationService>>,
    CompanyAdmin(admin): CompanyAdmin,
    Json(req): Json<BroadcastRequest>,
) -> AppResult<Json<ApiResponse<BroadcastReport>>> {
    let report = service.broadcast(&admin, req.draft, req.role).await?;
    let message = format!("delivered to {} of {} recipients", report.created, report.recipients);
    Ok(Json(ApiResponse::ok_with_message(report, message)))
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub affected: usize,
}

/// POST /notifications/mark-all-read
pub async fn mark_all_read(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<CountResponse>>> {
    let affected = service.mark_all_read(auth_user.id)?;
    Ok(Json(ApiResponse::ok(CountResponse { affected })))
}

/// POST /notifications/:id/read
pub async fn mark_read(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = service.mark_read(id, auth_user.id)?;
    Ok(Json(ApiResponse::ok(notification)))
}

/// PATCH /notifications/:id
pub async fn update_notification(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(changes): Json<NotificationChanges>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = service.update(id, auth_user.id, changes)?;
    Ok(Json(ApiResponse::ok(notification)))
}

/// DELETE /notifications/:id
pub async fn delete_notification(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    service.delete(id, auth_user.id)?;
    Ok(Json(ApiResponse::ok(())))
}

/// DELETE /notifications
pub async fn delete_all_notifications(
    State(service): State<Arc<NotificationService>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<CountResponse>>> {
    let affected = service.delete_all(auth_user.id)?;
    Ok(Json(ApiResponse::ok(CountResponse { affected })))
}
