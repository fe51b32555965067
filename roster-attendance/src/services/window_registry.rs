use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc};
use uuid::Uuid;

use roster_shared::audit::{self, actions, ActivityLog, NewActivity};
use roster_shared::clock::Clock;
use roster_shared::errors::{AppError, AppResult, ErrorCode};
use roster_shared::types::auth::AuthUser;

use crate::models::{AttendanceStatus, CheckInWindow, WindowInput, WindowPreset, WindowSpec};
use crate::store::WindowStore;

/// Company check-in windows and the punctuality read contract built on them.
pub struct WindowRegistry {
    store: Arc<dyn WindowStore>,
    activity: Arc<dyn ActivityLog>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl WindowRegistry {
    pub fn new(
        store: Arc<dyn WindowStore>,
        activity: Arc<dyn ActivityLog>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            activity,
            clock,
            offset,
        }
    }

    pub fn list(&self, company_id: Uuid) -> AppResult<Vec<CheckInWindow>> {
        self.store.list(company_id)
    }

    pub fn create(&self, actor: &AuthUser, input: WindowInput) -> AppResult<CheckInWindow> {
        let spec = input.into_spec()?;
        self.insert(actor, spec)
    }

    pub fn create_preset(&self, actor: &AuthUser, preset: WindowPreset) -> AppResult<CheckInWindow> {
        self.insert(actor, preset.spec())
    }

    pub fn update(&self, actor: &AuthUser, id: Uuid, input: WindowInput) -> AppResult<CheckInWindow> {
        let spec = input.into_spec()?;
        let window = self
            .store
            .update(actor.company_id, id, &spec, self.clock.now())?
            .ok_or_else(not_found)?;

        tracing::info!(window_id = %window.id, company_id = %actor.company_id, "check-in window updated");
        self.audit(actor, actions::UPDATE_WINDOW, &window, format!("Updated check-in window \"{}\"", window.name));
        Ok(window)
    }

    pub fn delete(&self, actor: &AuthUser, id: Uuid) -> AppResult<()> {
        if !self.store.delete(actor.company_id, id)? {
            return Err(not_found());
        }

        tracing::info!(window_id = %id, company_id = %actor.company_id, "check-in window deleted");
        audit::record(
            self.activity.as_ref(),
            NewActivity::new(actor.id, actor.company_id, actions::DELETE_WINDOW, "Deleted check-in window")
                .with_metadata(serde_json::json!({ "window_id": id })),
        );
        Ok(())
    }

    /// True when `instant`, projected to company-local time, falls in `[start, end)`
    /// of at least one active window whose days include the local weekday.
    pub fn is_within_any_window(&self, company_id: Uuid, instant: DateTime<Utc>) -> AppResult<bool> {
        let (weekday, time) = self.local_weekday_time(instant);
        let windows = self.store.list(company_id)?;
        Ok(windows.iter().any(|w| w.contains(weekday, time)))
    }

    /// Status for a check-in at `instant`.
    ///
    /// With no active window scheduled for the local weekday, or when the time
    /// falls inside a window, or before the earliest window opens, the check-in
    /// counts as present. Otherwise it is late.
    pub fn classify(&self, company_id: Uuid, instant: DateTime<Utc>) -> AppResult<AttendanceStatus> {
        let (weekday, time) = self.local_weekday_time(instant);
        let windows = self.store.list(company_id)?;

        let todays: Vec<&CheckInWindow> = windows
            .iter()
            .filter(|w| w.is_active && w.days_of_week.contains(&weekday))
            .collect();

        let Some(earliest) = todays.iter().map(|w| w.start_time).min() else {
            return Ok(AttendanceStatus::Present);
        };
        if time < earliest || todays.iter().any(|w| w.contains(weekday, time)) {
            return Ok(AttendanceStatus::Present);
        }
        Ok(AttendanceStatus::Late)
    }

    fn local_weekday_time(&self, instant: DateTime<Utc>) -> (u8, NaiveTime) {
        let local = instant.with_timezone(&self.offset);
        (local.weekday().num_days_from_sunday() as u8, local.time())
    }

    fn insert(&self, actor: &AuthUser, spec: WindowSpec) -> AppResult<CheckInWindow> {
        let window = self.store.insert(actor.company_id, &spec, self.clock.now())?;

        tracing::info!(
            window_id = %window.id,
            company_id = %actor.company_id,
            start = %window.start_time,
            end = %window.end_time,
            "check-in window created"
        );
        self.audit(actor, actions::CREATE_WINDOW, &window, format!("Created check-in window \"{}\"", window.name));
        Ok(window)
    }

    fn audit(&self, actor: &AuthUser, action: &str, window: &CheckInWindow, description: String) {
        audit::record(
            self.activity.as_ref(),
            NewActivity::new(actor.id, actor.company_id, action, description).with_metadata(serde_json::json!({
                "window_id": window.id,
                "start_time": window.start_time,
                "end_time": window.end_time,
                "days_of_week": window.days_of_week,
                "is_active": window.is_active,
            })),
        );
    }
}

fn not_found() -> AppError {
    AppError::new(ErrorCode::WindowNotFound, "check-in window not found")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    use roster_shared::memory::{ManualClock, MemoryActivityLog};
    use roster_shared::types::auth::UserRole;

    use crate::memory::MemoryWindowStore;

    pub(crate) fn admin(company_id: Uuid) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            company_id,
            role: UserRole::Hr,
            token_id: Uuid::new_v4(),
        }
    }

    fn input(value: serde_json::Value) -> WindowInput {
        serde_json::from_value(value).unwrap()
    }

    fn registry_with_offset(minutes: i32) -> (WindowRegistry, Arc<MemoryActivityLog>) {
        let activity = Arc::new(MemoryActivityLog::default());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()));
        let registry = WindowRegistry::new(
            Arc::new(MemoryWindowStore::default()),
            activity.clone(),
            clock,
            FixedOffset::east_opt(minutes * 60).unwrap(),
        );
        (registry, activity)
    }

    fn registry() -> (WindowRegistry, Arc<MemoryActivityLog>) {
        registry_with_offset(0)
    }

    // 2024-03-01 is a Friday, 2024-03-02 a Saturday.
    fn friday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn no_windows_never_match() {
        let (registry, _) = registry();
        assert!(!registry.is_within_any_window(Uuid::new_v4(), friday(9, 0)).unwrap());
    }

    #[test]
    fn matching_follows_day_set_and_half_open_interval() {
        let (registry, _) = registry();
        let acme = Uuid::new_v4();
        registry.create_preset(&admin(acme), WindowPreset::Morning).unwrap();

        assert!(registry.is_within_any_window(acme, friday(8, 0)).unwrap());
        assert!(registry.is_within_any_window(acme, friday(9, 59)).unwrap());
        assert!(!registry.is_within_any_window(acme, friday(10, 0)).unwrap());
        assert!(!registry.is_within_any_window(acme, friday(7, 59)).unwrap());

        let saturday = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        assert!(!registry.is_within_any_window(acme, saturday).unwrap());

        // Other companies never see acme's windows.
        assert!(!registry.is_within_any_window(Uuid::new_v4(), friday(9, 0)).unwrap());
    }

    #[test]
    fn inactive_windows_are_ignored() {
        let (registry, _) = registry();
        let acme = Uuid::new_v4();
        registry
            .create(
                &admin(acme),
                input(json!({ "name": "Paused", "start_time": "08:00", "end_time": "10:00", "is_active": false })),
            )
            .unwrap();
        assert!(!registry.is_within_any_window(acme, friday(9, 0)).unwrap());
    }

    #[test]
    fn overlapping_windows_are_accepted() {
        let (registry, _) = registry();
        let acme = Uuid::new_v4();
        let hr = admin(acme);
        registry.create_preset(&hr, WindowPreset::Flexible).unwrap();
        registry.create_preset(&hr, WindowPreset::Standard).unwrap();
        registry.create_preset(&hr, WindowPreset::Standard).unwrap();

        assert_eq!(registry.list(acme).unwrap().len(), 3);
        assert!(registry.is_within_any_window(acme, friday(9, 15)).unwrap());
    }

    #[test]
    fn matching_uses_the_local_projection() {
        // UTC+2: 07:30 UTC is 09:30 local.
        let (registry, _) = registry_with_offset(120);
        let acme = Uuid::new_v4();
        registry.create_preset(&admin(acme), WindowPreset::Morning).unwrap();

        assert!(registry.is_within_any_window(acme, friday(7, 30)).unwrap());
        assert!(!registry.is_within_any_window(acme, friday(9, 30)).unwrap());

        // Friday 23:00 UTC is already Saturday locally.
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
        assert_eq!(registry.classify(acme, late).unwrap(), AttendanceStatus::Present);
    }

    #[test]
    fn classify_separates_early_on_time_and_late() {
        let (registry, _) = registry();
        let acme = Uuid::new_v4();
        registry.create_preset(&admin(acme), WindowPreset::Standard).unwrap();

        assert_eq!(registry.classify(acme, friday(8, 30)).unwrap(), AttendanceStatus::Present);
        assert_eq!(registry.classify(acme, friday(9, 5)).unwrap(), AttendanceStatus::Present);
        assert_eq!(registry.classify(acme, friday(9, 30)).unwrap(), AttendanceStatus::Late);
        assert_eq!(registry.classify(Uuid::new_v4(), friday(11, 0)).unwrap(), AttendanceStatus::Present);
    }

    #[test]
    fn update_and_delete_are_company_scoped_and_audited() {
        let (registry, activity) = registry();
        let acme = Uuid::new_v4();
        let hr = admin(acme);
        let window = registry.create_preset(&hr, WindowPreset::Morning).unwrap();

        let outsider = admin(Uuid::new_v4());
        let err = registry
            .update(&outsider, window.id, input(json!({ "name": "Hijack", "start_time": "00:00", "end_time": "23:59" })))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::WindowNotFound));
        assert_eq!(registry.delete(&outsider, window.id).unwrap_err().code(), Some(ErrorCode::WindowNotFound));

        let updated = registry
            .update(
                &hr,
                window.id,
                input(json!({ "name": "Late Morning", "start_time": "09:00", "end_time": "11:00", "days_of_week": [1, 3] })),
            )
            .unwrap();
        assert_eq!(updated.days_of_week, vec![1, 3]);

        registry.delete(&hr, window.id).unwrap();
        assert!(registry.list(acme).unwrap().is_empty());

        let trail: Vec<_> = activity.entries().into_iter().map(|e| e.action).collect();
        assert_eq!(trail, vec![actions::CREATE_WINDOW, actions::UPDATE_WINDOW, actions::DELETE_WINDOW]);
    }

    #[test]
    fn invalid_input_is_rejected_before_writing() {
        let (registry, activity) = registry();
        let acme = Uuid::new_v4();
        let err = registry
            .create(&admin(acme), input(json!({ "name": "Night", "start_time": "22:00", "end_time": "06:00" })))
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidWindow));
        assert!(registry.list(acme).unwrap().is_empty());
        assert!(activity.entries().is_empty());
    }

    #[test]
    fn audit_outage_does_not_fail_window_writes() {
        let (registry, activity) = registry();
        activity.go_offline();
        let acme = Uuid::new_v4();
        registry.create_preset(&admin(acme), WindowPreset::Afternoon).unwrap();
        assert_eq!(registry.list(acme).unwrap().len(), 1);
    }
}
