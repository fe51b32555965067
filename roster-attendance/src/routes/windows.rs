use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use roster_shared::errors::AppResult;
use roster_shared::middleware::CompanyAdmin;
use roster_shared::types::api::ApiResponse;
use roster_shared::types::auth::AuthUser;

use crate::models::{CheckInWindow, WindowInput, WindowPreset};
use crate::AppState;

/// GET /windows
pub async fn list_windows(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<CheckInWindow>>>> {
    let windows = state.windows.list(auth_user.company_id)?;
    Ok(Json(ApiResponse::ok(windows)))
}

/// POST /windows
pub async fn create_window(
    State(state): State<Arc<AppState>>,
    CompanyAdmin(admin): CompanyAdmin,
    Json(input): Json<WindowInput>,
) -> AppResult<Json<ApiResponse<CheckInWindow>>> {
    let window = state.windows.create(&admin, input)?;
    Ok(Json(ApiResponse::ok(window)))
}

/// POST /windows/presets/:preset
pub async fn create_preset(
    State(state): State<Arc<AppState>>,
    CompanyAdmin(admin): CompanyAdmin,
    Path(preset): Path<String>,
) -> AppResult<Json<ApiResponse<CheckInWindow>>> {
    let preset: WindowPreset = preset.parse()?;
    let window = state.windows.create_preset(&admin, preset)?;
    Ok(Json(ApiResponse::ok(window)))
}

#[derive(Debug, Deserialize)]
pub struct MatchParams {
    /// Defaults to now.
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub at: DateTime<Utc>,
    pub within_window: bool,
}

/// GET /windows/match?at=
pub async fn match_window(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(params): Query<MatchParams>,
) -> AppResult<Json<ApiResponse<MatchResponse>>> {
    let at = params.at.unwrap_or_else(Utc::now);
    let within_window = state.windows.is_within_any_window(auth_user.company_id, at)?;
    Ok(Json(ApiResponse::ok(MatchResponse { at, within_window })))
}

/// PUT /windows/:id
pub async fn update_window(
    State(state): State<Arc<AppState>>,
    CompanyAdmin(admin): CompanyAdmin,
    Path(id): Path<Uuid>,
    Json(input): Json<WindowInput>,
) -> AppResult<Json<ApiResponse<CheckInWindow>>> {
    let window = state.windows.update(&admin, id, input)?;
    Ok(Json(ApiResponse::ok(window)))
}

/// DELETE /windows/:id
pub async fn delete_window(
    State(state): State<Arc<AppState>>,
    CompanyAdmin(admin): CompanyAdmin,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.windows.delete(&admin, id)?;
    Ok(Json(ApiResponse::ok_with_message((), "window deleted")))
}
