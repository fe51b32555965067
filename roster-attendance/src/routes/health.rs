use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use roster_shared::types::api::{HealthResponse, HealthStatus};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.db.get() {
        Ok(_) => HealthStatus::Healthy,
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the database");
            HealthStatus::Unhealthy
        }
    };
    Json(HealthResponse::new("roster-attendance", env!("CARGO_PKG_VERSION"), database))
}
