use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;

use roster_shared::errors::AppResult;
use roster_shared::types::api::ApiResponse;
use roster_shared::types::auth::AuthUser;
use roster_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::{AttendanceRecord, CheckInDetails, CheckOutDetails};
use crate::services::TransitionOutcome;
use crate::AppState;

/// POST /attendance/check-in
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(details): Json<CheckInDetails>,
) -> AppResult<Json<ApiResponse<TransitionOutcome>>> {
    let outcome = state.recorder.check_in(auth_user.id, details).await?;
    Ok(Json(ApiResponse::ok_with_message(outcome, "checked in")))
}

/// POST /attendance/check-out
/// The body is optional; `{ "notes": "..." }` replaces the stored notes.
pub async fn check_out(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    body: Option<Json<CheckOutDetails>>,
) -> AppResult<Json<ApiResponse<TransitionOutcome>>> {
    let details = body.map(|Json(d)| d).unwrap_or_default();
    let outcome = state.recorder.check_out(auth_user.id, details).await?;
    Ok(Json(ApiResponse::ok_with_message(outcome, "checked out")))
}

/// GET /attendance/today
pub async fn today(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<AttendanceRecord>>> {
    let record = state.recorder.today(auth_user.id)?;
    Ok(Json(ApiResponse::ok(record)))
}

/// GET /attendance/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<AttendanceRecord>>>> {
    let page = state.recorder.history(auth_user.id, &params)?;
    Ok(Json(ApiResponse::ok(page)))
}
