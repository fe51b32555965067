pub mod activity;
pub mod attendance;
pub mod health;
pub mod windows;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::AppState;

/// Attendance, window and activity routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/attendance/check-in", post(attendance::check_in))
        .route("/attendance/check-out", post(attendance::check_out))
        .route("/attendance/today", get(attendance::today))
        .route("/attendance/history", get(attendance::history))
        .route("/windows", get(windows::list_windows).post(windows::create_window))
        .route("/windows/presets/:preset", post(windows::create_preset))
        .route("/windows/match", get(windows::match_window))
        .route("/windows/:id", put(windows::update_window).delete(windows::delete_window))
        .route("/activity", get(activity::list_activity))
}
