use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;

use roster_shared::audit::ActivityLogEntry;
use roster_shared::errors::AppResult;
use roster_shared::middleware::CompanyAdmin;
use roster_shared::types::api::ApiResponse;
use roster_shared::types::pagination::{Paginated, PaginationParams};

use crate::AppState;

/// GET /activity
/// Company activity log, newest first.
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    CompanyAdmin(admin): CompanyAdmin,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ActivityLogEntry>>>> {
    let (items, total) = state.activity.list_for_company(
        admin.company_id,
        params.limit() as i64,
        params.offset() as i64,
    )?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total as u64, &params))))
}
