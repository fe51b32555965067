//! Attendance recording against company check-in windows.

pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

#[cfg(test)]
mod memory;

use std::sync::Arc;

use roster_shared::audit::ActivityLog;
use roster_shared::clients::db::DbPool;

use services::{AttendanceRecorder, WindowRegistry};

pub struct AppState {
    pub db: DbPool,
    pub recorder: Arc<AttendanceRecorder>,
    pub windows: Arc<WindowRegistry>,
    pub activity: Arc<dyn ActivityLog>,
}
