//! In-memory collaborators for tests.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::audit::{ActivityLog, ActivityLogEntry, NewActivity};
use crate::clock::Clock;
use crate::directory::{Member, MemberDirectory};
use crate::errors::{AppError, AppResult};
use crate::types::auth::UserRole;

#[derive(Default)]
pub struct MemoryActivityLog {
    entries: Mutex<Vec<ActivityLogEntry>>,
    offline: Mutex<bool>,
}

impl MemoryActivityLog {
    pub fn entries(&self) -> Vec<ActivityLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Make every append fail.
    pub fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }
}

impl ActivityLog for MemoryActivityLog {
    fn append(&self, entry: NewActivity) -> AppResult<ActivityLogEntry> {
        if *self.offline.lock().unwrap() {
            return Err(AppError::internal("activity log unavailable"));
        }
        let written = ActivityLogEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            company_id: entry.company_id,
            action: entry.action,
            description: entry.description,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        self.entries.lock().unwrap().push(written.clone());
        Ok(written)
    }

    fn list_for_company(
        &self,
        company_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<ActivityLogEntry>, i64)> {
        let entries = self.entries.lock().unwrap();
        let matching: Vec<_> = entries
            .iter()
            .rev()
            .filter(|e| e.company_id == company_id)
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    members: Mutex<Vec<Member>>,
}

impl MemoryDirectory {
    pub fn add(&self, company_id: Uuid, role: UserRole, display_name: &str) -> Member {
        let member = Member {
            id: Uuid::new_v4(),
            company_id,
            role,
            display_name: display_name.to_string(),
        };
        self.members.lock().unwrap().push(member.clone());
        member
    }
}

impl MemberDirectory for MemoryDirectory {
    fn find(&self, user_id: Uuid) -> AppResult<Option<Member>> {
        Ok(self.members.lock().unwrap().iter().find(|m| m.id == user_id).cloned())
    }

    fn members_of(&self, company_id: Uuid, role: Option<UserRole>) -> AppResult<Vec<Member>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.company_id == company_id && role.map_or(true, |r| m.role == r))
            .cloned()
            .collect())
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
