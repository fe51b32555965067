use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use roster_notification::models::{Notification, NotificationDraft, NotificationType};
use roster_notification::NotificationService;
use roster_shared::audit::{self, actions, ActivityLog, NewActivity};
use roster_shared::clock::Clock;
use roster_shared::directory::{self, Member, MemberDirectory};
use roster_shared::errors::{AppError, AppResult, ErrorCode};
use roster_shared::types::pagination::{Paginated, PaginationParams};

use super::window_registry::WindowRegistry;
use crate::config::{AppConfig, RepeatCheckIn};
use crate::models::{AttendanceRecord, AttendanceStatus, CheckInDetails, CheckInUpsert, CheckOutDetails};
use crate::store::AttendanceStore;

/// Knobs that decide how transitions are applied.
#[derive(Debug, Clone, Copy)]
pub struct AttendancePolicy {
    pub offset: FixedOffset,
    pub repeat_check_in: RepeatCheckIn,
    pub classify_lateness: bool,
}

impl AttendancePolicy {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            offset: config.utc_offset()?,
            repeat_check_in: config.repeat_check_in,
            classify_lateness: config.classify_lateness,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Transition {
    CheckIn(CheckInDetails),
    CheckOut(CheckOutDetails),
}

/// The durable record plus what happened to its side effects.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub record: AttendanceRecord,
    pub notification: Option<Notification>,
    pub audited: bool,
}

pub struct AttendanceRecorder {
    records: Arc<dyn AttendanceStore>,
    windows: Arc<WindowRegistry>,
    notifications: Arc<NotificationService>,
    directory: Arc<dyn MemberDirectory>,
    activity: Arc<dyn ActivityLog>,
    clock: Arc<dyn Clock>,
    policy: AttendancePolicy,
}

impl AttendanceRecorder {
    pub fn new(
        records: Arc<dyn AttendanceStore>,
        windows: Arc<WindowRegistry>,
        notifications: Arc<NotificationService>,
        directory: Arc<dyn MemberDirectory>,
        activity: Arc<dyn ActivityLog>,
        clock: Arc<dyn Clock>,
        policy: AttendancePolicy,
    ) -> Self {
        Self {
            records,
            windows,
            notifications,
            directory,
            activity,
            clock,
            policy,
        }
    }

    pub async fn check_in(&self, user_id: Uuid, details: CheckInDetails) -> AppResult<TransitionOutcome> {
        self.record_transition(user_id, Transition::CheckIn(details)).await
    }

    pub async fn check_out(&self, user_id: Uuid, details: CheckOutDetails) -> AppResult<TransitionOutcome> {
        self.record_transition(user_id, Transition::CheckOut(details)).await
    }

    /// Apply a transition to the caller's record for today.
    ///
    /// Only the attendance write can fail the call. The notification and the
    /// activity entry run afterwards in their own failure domain and are
    /// reported through the outcome.
    pub async fn record_transition(&self, user_id: Uuid, transition: Transition) -> AppResult<TransitionOutcome> {
        let member = directory::resolve(self.directory.as_ref(), user_id)?;
        let now = self.clock.now();
        let today = self.local_date(now);

        let (record, action) = match transition {
            Transition::CheckIn(details) => (self.apply_check_in(&member, today, now, details)?, actions::CHECK_IN),
            Transition::CheckOut(details) => (self.apply_check_out(&member, today, now, details)?, actions::CHECK_OUT),
        };

        tracing::info!(
            user_id = %user_id,
            record_id = %record.id,
            date = %record.date,
            status = %record.status,
            action,
            "attendance transition recorded"
        );

        let notification = self.notify(&record, action, now).await;
        let audited = audit::record(
            self.activity.as_ref(),
            NewActivity::new(member.id, member.company_id, action, describe(action, &record))
                .with_metadata(serde_json::json!({
                    "record_id": record.id,
                    "date": record.date,
                    "status": record.status,
                    "work_mode": record.work_mode,
                    "at": now,
                })),
        );

        Ok(TransitionOutcome {
            record,
            notification,
            audited,
        })
    }

    /// The caller's record for today.
    pub fn today(&self, user_id: Uuid) -> AppResult<AttendanceRecord> {
        let today = self.local_date(self.clock.now());
        self.records
            .find_for_day(user_id, today)?
            .ok_or_else(|| AppError::new(ErrorCode::AttendanceRecordNotFound, "no attendance record for today"))
    }

    pub fn history(&self, user_id: Uuid, params: &PaginationParams) -> AppResult<Paginated<AttendanceRecord>> {
        let (items, total) = self
            .records
            .history(user_id, params.limit() as i64, params.offset() as i64)?;
        Ok(Paginated::new(items, total as u64, params))
    }

    fn apply_check_in(
        &self,
        member: &Member,
        today: NaiveDate,
        now: DateTime<Utc>,
        details: CheckInDetails,
    ) -> AppResult<AttendanceRecord> {
        let status = self.status_for(member, now);
        let overwrite = self.policy.repeat_check_in == RepeatCheckIn::Overwrite;
        self.records
            .upsert_check_in(
                CheckInUpsert {
                    user_id: member.id,
                    date: today,
                    check_in: now,
                    status,
                    work_mode: details.work_mode,
                    verification_method: details.verification_method,
                    location: details.location,
                },
                overwrite,
            )?
            .ok_or_else(|| AppError::new(ErrorCode::AlreadyCheckedIn, "already checked in today"))
    }

    fn apply_check_out(
        &self,
        member: &Member,
        today: NaiveDate,
        now: DateTime<Utc>,
        details: CheckOutDetails,
    ) -> AppResult<AttendanceRecord> {
        let no_check_in = || AppError::new(ErrorCode::NoActiveCheckIn, "no check-in recorded for today");

        let record = self
            .records
            .find_for_day(member.id, today)?
            .filter(|r| r.check_in.is_some())
            .ok_or_else(no_check_in)?;

        self.records
            .record_check_out(record.id, now, details.notes.as_deref())?
            .ok_or_else(no_check_in)
    }

    fn status_for(&self, member: &Member, now: DateTime<Utc>) -> AttendanceStatus {
        if !self.policy.classify_lateness {
            return AttendanceStatus::Present;
        }
        match self.windows.classify(member.company_id, now) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, company_id = %member.company_id, "window lookup failed, defaulting to present");
                AttendanceStatus::Present
            }
        }
    }

    async fn notify(&self, record: &AttendanceRecord, action: &str, now: DateTime<Utc>) -> Option<Notification> {
        let local = now.with_timezone(&self.policy.offset).format("%H:%M");
        let (title, message) = if action == actions::CHECK_IN {
            ("Check-in recorded", format!("You checked in at {local} ({})", record.status))
        } else {
            ("Check-out recorded", format!("You checked out at {local}"))
        };
        let draft = NotificationDraft::new(NotificationType::Attendance, title, message).with_action_url("/attendance");

        match self.notifications.create(record.user_id, draft).await {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::error!(error = %e, user_id = %record.user_id, action, "attendance notification failed");
                None
            }
        }
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.policy.offset).date_naive()
    }
}

fn describe(action: &str, record: &AttendanceRecord) -> String {
    if action == actions::CHECK_IN {
        format!("Checked in ({}, {})", record.work_mode, record.status)
    } else {
        "Checked out".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{NaiveTime, TimeZone};
    use futures::future::join_all;
    use tokio::sync::Barrier;

    use roster_notification::memory::{MemoryNotificationStore, MemorySubscriptionStore, ScriptedTransport};
    use roster_notification::PushDelivery;
    use roster_shared::memory::{ManualClock, MemoryActivityLog, MemoryDirectory};
    use roster_shared::types::auth::UserRole;

    use crate::memory::{MemoryAttendanceStore, MemoryWindowStore};
    use crate::models::{WindowPreset, WorkMode};
    use crate::services::window_registry::tests::admin;

    struct Harness {
        recorder: AttendanceRecorder,
        records: Arc<MemoryAttendanceStore>,
        windows: Arc<WindowRegistry>,
        notifications: Arc<MemoryNotificationStore>,
        directory: Arc<MemoryDirectory>,
        activity: Arc<MemoryActivityLog>,
        clock: Arc<ManualClock>,
    }

    fn policy(repeat_check_in: RepeatCheckIn, classify_lateness: bool) -> AttendancePolicy {
        AttendancePolicy {
            offset: FixedOffset::east_opt(0).unwrap(),
            repeat_check_in,
            classify_lateness,
        }
    }

    fn harness_with(policy: AttendancePolicy) -> Harness {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap()));
        let directory = Arc::new(MemoryDirectory::default());
        let activity = Arc::new(MemoryActivityLog::default());
        let notifications = Arc::new(MemoryNotificationStore::default());
        let push = Arc::new(PushDelivery::new(
            Arc::new(MemorySubscriptionStore::default()),
            Arc::new(ScriptedTransport::default()),
            Duration::from_millis(100),
        ));
        let service = Arc::new(NotificationService::new(
            notifications.clone(),
            push,
            directory.clone(),
            activity.clone(),
            clock.clone(),
        ));
        let windows = Arc::new(WindowRegistry::new(
            Arc::new(MemoryWindowStore::default()),
            activity.clone(),
            clock.clone(),
            policy.offset,
        ));
        let records = Arc::new(MemoryAttendanceStore::default());
        let recorder = AttendanceRecorder::new(
            records.clone(),
            windows.clone(),
            service,
            directory.clone(),
            activity.clone(),
            clock.clone(),
            policy,
        );
        Harness { recorder, records, windows, notifications, directory, activity, clock }
    }

    fn harness() -> Harness {
        harness_with(policy(RepeatCheckIn::Overwrite, true))
    }

    fn office() -> CheckInDetails {
        CheckInDetails {
            work_mode: WorkMode::Office,
            verification_method: None,
            location: None,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn full_day_keeps_a_single_record() {
        let h = harness();
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");

        let first = h.recorder.check_in(u1.id, office()).await.unwrap();
        assert_eq!(first.record.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(first.record.check_in, Some(at(9, 5)));
        assert_eq!(first.record.status, AttendanceStatus::Present);
        assert!(first.notification.is_some());
        assert!(first.audited);

        h.clock.set(at(17, 30));
        let out = h.recorder.check_out(u1.id, CheckOutDetails::default()).await.unwrap();
        assert_eq!(out.record.id, first.record.id);
        assert_eq!(out.record.check_out, Some(at(17, 30)));
        assert_eq!(out.record.check_in, Some(at(9, 5)));

        h.clock.set(at(9, 10));
        let again = h.recorder.check_in(u1.id, office()).await.unwrap();
        assert_eq!(again.record.id, first.record.id);
        assert_eq!(again.record.check_in, Some(at(9, 10)));
        assert_eq!(h.records.all().len(), 1);
    }

    #[tokio::test]
    async fn check_out_without_check_in_fails() {
        let h = harness();
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");

        let err = h.recorder.check_out(u1.id, CheckOutDetails::default()).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NoActiveCheckIn));
        assert!(h.notifications.all().is_empty());
        assert!(h.activity.entries().is_empty());

        // Yesterday's record does not count for today.
        h.clock.set(at(9, 0) - chrono::Duration::days(1));
        h.recorder.check_in(u1.id, office()).await.unwrap();
        h.clock.set(at(17, 0));
        let err = h.recorder.check_out(u1.id, CheckOutDetails::default()).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NoActiveCheckIn));
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let h = harness();
        let err = h.recorder.check_in(Uuid::new_v4(), office()).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UserNotFound));
        assert!(h.records.all().is_empty());
    }

    #[tokio::test]
    async fn check_out_notes_merge() {
        let h = harness();
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");
        h.recorder.check_in(u1.id, office()).await.unwrap();

        h.clock.set(at(12, 0));
        let out = h
            .recorder
            .check_out(u1.id, CheckOutDetails { notes: Some("dentist".into()) })
            .await
            .unwrap();
        assert_eq!(out.record.notes.as_deref(), Some("dentist"));

        h.clock.set(at(18, 0));
        let out = h.recorder.check_out(u1.id, CheckOutDetails::default()).await.unwrap();
        assert_eq!(out.record.notes.as_deref(), Some("dentist"));
        assert_eq!(out.record.check_out, Some(at(18, 0)));
    }

    #[tokio::test]
    async fn reject_policy_refuses_a_second_check_in() {
        let h = harness_with(policy(RepeatCheckIn::Reject, true));
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");
        h.recorder.check_in(u1.id, office()).await.unwrap();

        h.clock.set(at(9, 10));
        let err = h.recorder.check_in(u1.id, office()).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AlreadyCheckedIn));
        assert_eq!(h.records.all()[0].check_in, Some(at(9, 5)));
    }

    /// Fires `n` check-ins for `user_id` from separate worker threads at once.
    async fn race_check_ins(h: &Arc<Harness>, user_id: Uuid, n: usize) -> Vec<AppResult<TransitionOutcome>> {
        let barrier = Arc::new(Barrier::new(n));
        let tasks: Vec<_> = (0..n)
            .map(|_| {
                let h = h.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    h.recorder.check_in(user_id, office()).await
                })
            })
            .collect();
        join_all(tasks).await.into_iter().map(Result::unwrap).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_check_ins_converge() {
        let h = Arc::new(harness());
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");

        let outcomes = race_check_ins(&h, u1.id, 8).await;
        assert!(outcomes.iter().all(Result::is_ok));

        let rows = h.records.all();
        assert_eq!(rows.len(), 1);
        assert!(outcomes.iter().flatten().all(|o| o.record.id == rows[0].id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reject_policy_holds_under_concurrent_check_ins() {
        let h = Arc::new(harness_with(policy(RepeatCheckIn::Reject, true)));
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");

        let outcomes = race_check_ins(&h, u1.id, 2).await;
        let accepted: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        assert_eq!(accepted.len(), 1);
        let refused = outcomes.iter().filter_map(|o| o.as_ref().err()).collect::<Vec<_>>();
        assert_eq!(refused.len(), 1);
        assert_eq!(refused[0].code(), Some(ErrorCode::AlreadyCheckedIn));

        let rows = h.records.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, accepted[0].record.id);
    }

    #[tokio::test]
    async fn lateness_follows_company_windows() {
        let h = harness();
        let acme = Uuid::new_v4();
        h.windows.create_preset(&admin(acme), WindowPreset::Standard).unwrap();
        let early = h.directory.add(acme, UserRole::Staff, "early");
        let late = h.directory.add(acme, UserRole::Staff, "late");
        let elsewhere = h.directory.add(Uuid::new_v4(), UserRole::Staff, "elsewhere");

        h.clock.set(at(8, 45));
        let outcome = h.recorder.check_in(early.id, office()).await.unwrap();
        assert_eq!(outcome.record.status, AttendanceStatus::Present);

        h.clock.set(at(9, 45));
        let outcome = h.recorder.check_in(late.id, office()).await.unwrap();
        assert_eq!(outcome.record.status, AttendanceStatus::Late);
        let message = outcome.notification.unwrap().message;
        assert!(message.contains("09:45") && message.contains("late"));

        let outcome = h.recorder.check_in(elsewhere.id, office()).await.unwrap();
        assert_eq!(outcome.record.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn lateness_can_be_switched_off() {
        let h = harness_with(policy(RepeatCheckIn::Overwrite, false));
        let acme = Uuid::new_v4();
        h.windows.create_preset(&admin(acme), WindowPreset::Standard).unwrap();
        let u1 = h.directory.add(acme, UserRole::Staff, "u1");

        h.clock.set(at(11, 0));
        let outcome = h.recorder.check_in(u1.id, office()).await.unwrap();
        assert_eq!(outcome.record.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn notification_outage_does_not_fail_the_transition() {
        let h = harness();
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");
        h.notifications.go_offline();

        let outcome = h.recorder.check_in(u1.id, office()).await.unwrap();
        assert!(outcome.notification.is_none());
        assert!(outcome.audited);
        assert_eq!(h.records.all().len(), 1);
    }

    #[tokio::test]
    async fn audit_outage_does_not_fail_the_transition() {
        let h = harness();
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");
        h.activity.go_offline();

        let outcome = h.recorder.check_in(u1.id, office()).await.unwrap();
        assert!(!outcome.audited);
        assert!(outcome.notification.is_some());
        assert!(outcome.record.check_in.is_some());
    }

    #[tokio::test]
    async fn notification_and_audit_describe_the_transition() {
        let h = harness();
        let acme = Uuid::new_v4();
        let u1 = h.directory.add(acme, UserRole::Staff, "u1");
        h.recorder.check_in(u1.id, office()).await.unwrap();

        let notes = h.notifications.all();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].user_id, u1.id);
        assert_eq!(notes[0].notification_type, NotificationType::Attendance);
        assert_eq!(notes[0].action_url.as_deref(), Some("/attendance"));
        assert!(notes[0].message.contains("09:05"));

        let entries = h.activity.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, actions::CHECK_IN);
        assert_eq!(entries[0].company_id, acme);
        assert_eq!(entries[0].metadata["work_mode"], "office");
    }

    #[tokio::test]
    async fn local_offset_decides_the_calendar_date() {
        let mut p = policy(RepeatCheckIn::Overwrite, true);
        p.offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let h = harness_with(p);
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");

        h.clock.set(at(23, 30));
        let outcome = h.recorder.check_in(u1.id, office()).await.unwrap();
        assert_eq!(outcome.record.date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!(outcome.notification.unwrap().message.contains("01:30"));
        assert_eq!(h.recorder.today(u1.id).unwrap().id, outcome.record.id);
    }

    #[tokio::test]
    async fn today_and_history() {
        let h = harness();
        let u1 = h.directory.add(Uuid::new_v4(), UserRole::Staff, "u1");
        assert_eq!(
            h.recorder.today(u1.id).unwrap_err().code(),
            Some(ErrorCode::AttendanceRecordNotFound)
        );

        for day in 0..3 {
            h.clock.set(at(9, 0) + chrono::Duration::days(day));
            h.recorder.check_in(u1.id, office()).await.unwrap();
        }

        let page = h
            .recorder
            .history(u1.id, &PaginationParams { page: 1, per_page: 2 })
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(page.items[0].check_in.map(|t| t.time()), NaiveTime::from_hms_opt(9, 0, 0));
    }
}
