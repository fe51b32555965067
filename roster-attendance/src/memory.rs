//! In-memory attendance and window stores for tests.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use roster_shared::errors::AppResult;

use crate::models::{AttendanceRecord, CheckInUpsert, CheckInWindow, WindowSpec};
use crate::store::{AttendanceStore, WindowStore};

#[derive(Default)]
pub struct MemoryAttendanceStore {
    rows: Mutex<Vec<AttendanceRecord>>,
}

impl MemoryAttendanceStore {
    pub fn all(&self) -> Vec<AttendanceRecord> {
        self.rows.lock().unwrap().clone()
    }
}

impl AttendanceStore for MemoryAttendanceStore {
    fn upsert_check_in(&self, upsert: CheckInUpsert, overwrite: bool) -> AppResult<Option<AttendanceRecord>> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.user_id == upsert.user_id && r.date == upsert.date)
        {
            if row.check_in.is_some() && !overwrite {
                return Ok(None);
            }
            row.check_in = Some(upsert.check_in);
            row.status = upsert.status;
            row.work_mode = upsert.work_mode;
            row.verification_method = upsert.verification_method;
            row.location = upsert.location;
            row.updated_at = upsert.check_in;
            return Ok(Some(row.clone()));
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            user_id: upsert.user_id,
            date: upsert.date,
            check_in: Some(upsert.check_in),
            check_out: None,
            status: upsert.status,
            work_mode: upsert.work_mode,
            verification_method: upsert.verification_method,
            location: upsert.location,
            notes: None,
            created_at: upsert.check_in,
            updated_at: upsert.check_in,
        };
        rows.push(record.clone());
        Ok(Some(record))
    }

    fn find_for_day(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Option<AttendanceRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.user_id == user_id && r.date == date)
            .cloned())
    }

    fn record_check_out(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Option<AttendanceRecord>> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows
            .iter_mut()
            .find(|r| r.id == id && r.check_in.is_some())
            .map(|r| {
                r.check_out = Some(at);
                if let Some(notes) = notes {
                    r.notes = Some(notes.to_string());
                }
                r.updated_at = at;
                r.clone()
            }))
    }

    fn history(&self, user_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<AttendanceRecord>, i64)> {
        let rows = self.rows.lock().unwrap();
        let mut mine: Vec<_> = rows.iter().filter(|r| r.user_id == user_id).cloned().collect();
        mine.sort_by(|a, b| b.date.cmp(&a.date));
        let total = mine.len() as i64;
        let page = mine.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct MemoryWindowStore {
    rows: Mutex<Vec<CheckInWindow>>,
}

impl WindowStore for MemoryWindowStore {
    fn insert(&self, company_id: Uuid, spec: &WindowSpec, now: DateTime<Utc>) -> AppResult<CheckInWindow> {
        let window = CheckInWindow {
            id: Uuid::new_v4(),
            company_id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            start_time: spec.start_time,
            end_time: spec.end_time,
            days_of_week: spec.days_of_week.clone(),
            is_active: spec.is_active,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(window.clone());
        Ok(window)
    }

    fn update(
        &self,
        company_id: Uuid,
        id: Uuid,
        spec: &WindowSpec,
        now: DateTime<Utc>,
    ) -> AppResult<Option<CheckInWindow>> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows
            .iter_mut()
            .find(|w| w.id == id && w.company_id == company_id)
            .map(|w| {
                w.name = spec.name.clone();
                w.description = spec.description.clone();
                w.start_time = spec.start_time;
                w.end_time = spec.end_time;
                w.days_of_week = spec.days_of_week.clone();
                w.is_active = spec.is_active;
                w.updated_at = now;
                w.clone()
            }))
    }

    fn delete(&self, company_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|w| !(w.id == id && w.company_id == company_id));
        Ok(rows.len() < before)
    }

    fn list(&self, company_id: Uuid) -> AppResult<Vec<CheckInWindow>> {
        let mut windows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.company_id == company_id)
            .cloned()
            .collect();
        windows.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.name.cmp(&b.name)));
        Ok(windows)
    }
}
