//! Append-only activity log.
//!
//! Every mutating action records who did what and when. Writes are a pure
//! side-effect sink: callers go through [`record`], which never fails.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::clients::db::{checkout, DbPool};
use crate::errors::AppResult;
use crate::schema::activity_logs;

/// Activity action codes (short verb-noun identifiers).
pub mod actions {
    pub const CHECK_IN: &str = "CHECK_IN";
    pub const CHECK_OUT: &str = "CHECK_OUT";
    pub const CREATE_WINDOW: &str = "CREATE_WINDOW";
    pub const UPDATE_WINDOW: &str = "UPDATE_WINDOW";
    pub const DELETE_WINDOW: &str = "DELETE_WINDOW";
    pub const SEND_NOTIFICATION: &str = "SEND_NOTIFICATION";
    pub const BROADCAST_NOTIFICATION: &str = "BROADCAST_NOTIFICATION";
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = activity_logs)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub action: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = activity_logs)]
pub struct NewActivity {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub action: String,
    pub description: String,
    pub metadata: serde_json::Value,
}

impl NewActivity {
    pub fn new(user_id: Uuid, company_id: Uuid, action: &str, description: impl Into<String>) -> Self {
        Self {
            user_id,
            company_id,
            action: action.to_string(),
            description: description.into(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

pub trait ActivityLog: Send + Sync {
    fn append(&self, entry: NewActivity) -> AppResult<ActivityLogEntry>;

    /// Entries for one company, newest first, with the total count.
    fn list_for_company(
        &self,
        company_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<ActivityLogEntry>, i64)>;
}

/// Append an entry, logging and swallowing any failure. Returns whether it was written.
pub fn record(log: &dyn ActivityLog, entry: NewActivity) -> bool {
    let action = entry.action.clone();
    let user_id = entry.user_id;
    match log.append(entry) {
        Ok(written) => {
            tracing::debug!(activity_id = %written.id, action = %action, user_id = %user_id, "activity recorded");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, action = %action, user_id = %user_id, "failed to record activity");
            false
        }
    }
}

pub struct PgActivityLog {
    pool: DbPool,
}

impl PgActivityLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ActivityLog for PgActivityLog {
    fn append(&self, entry: NewActivity) -> AppResult<ActivityLogEntry> {
        let mut conn = checkout(&self.pool)?;
        let written = diesel::insert_into(activity_logs::table)
            .values(&entry)
            .returning(ActivityLogEntry::as_returning())
            .get_result(&mut conn)?;
        Ok(written)
    }

    fn list_for_company(
        &self,
        company_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<ActivityLogEntry>, i64)> {
        let mut conn = checkout(&self.pool)?;

        let total: i64 = activity_logs::table
            .filter(activity_logs::company_id.eq(company_id))
            .count()
            .get_result(&mut conn)?;

        let items = activity_logs::table
            .filter(activity_logs::company_id.eq(company_id))
            .order(activity_logs::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(ActivityLogEntry::as_select())
            .load(&mut conn)?;

        Ok((items, total))
    }
}
