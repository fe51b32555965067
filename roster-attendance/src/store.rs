use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Bool;
use diesel::upsert::excluded;
use uuid::Uuid;

use roster_shared::clients::db::{checkout, DbPool};
use roster_shared::errors::{AppError, AppResult};

use crate::models::{AttendanceRecord, CheckInUpsert, CheckInWindow, WindowSpec};
use crate::schema::{attendance_records, check_in_windows};

/// Attendance rows, at most one per (user, date).
pub trait AttendanceStore: Send + Sync {
    /// Create today's record or fill its check-in fields, atomically. An existing
    /// check-in is replaced only when `overwrite` is set; otherwise `None` comes back
    /// and the stored row is left untouched.
    fn upsert_check_in(&self, upsert: CheckInUpsert, overwrite: bool) -> AppResult<Option<AttendanceRecord>>;
    fn find_for_day(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Option<AttendanceRecord>>;
    /// Set the check-out time on a record that has a check-in. `None` notes keep the stored ones.
    fn record_check_out(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Option<AttendanceRecord>>;
    /// Newest date first, with the total count.
    fn history(&self, user_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<AttendanceRecord>, i64)>;
}

/// Company-scoped check-in windows.
pub trait WindowStore: Send + Sync {
    fn insert(&self, company_id: Uuid, spec: &WindowSpec, now: DateTime<Utc>) -> AppResult<CheckInWindow>;
    fn update(
        &self,
        company_id: Uuid,
        id: Uuid,
        spec: &WindowSpec,
        now: DateTime<Utc>,
    ) -> AppResult<Option<CheckInWindow>>;
    fn delete(&self, company_id: Uuid, id: Uuid) -> AppResult<bool>;
    /// Ordered by start time.
    fn list(&self, company_id: Uuid) -> AppResult<Vec<CheckInWindow>>;
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = attendance_records)]
struct AttendanceRow {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    status: String,
    work_mode: String,
    verification_method: Option<String>,
    location: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let corrupt = |e: String| AppError::internal(format!("corrupt attendance row {}: {e}", row.id));
        let status = row.status.parse().map_err(corrupt)?;
        let work_mode = row.work_mode.parse().map_err(corrupt)?;
        let verification_method = row
            .verification_method
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(corrupt)?;
        Ok(AttendanceRecord {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            check_in: row.check_in,
            check_out: row.check_out,
            status,
            work_mode,
            verification_method,
            location: row.location,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = attendance_records)]
struct NewCheckInRow<'a> {
    user_id: Uuid,
    date: NaiveDate,
    check_in: DateTime<Utc>,
    status: &'a str,
    work_mode: &'a str,
    verification_method: Option<&'a str>,
    location: Option<&'a str>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub struct PgAttendanceStore {
    pool: DbPool,
}

impl PgAttendanceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AttendanceStore for PgAttendanceStore {
    fn upsert_check_in(&self, upsert: CheckInUpsert, overwrite: bool) -> AppResult<Option<AttendanceRecord>> {
        let mut conn = checkout(&self.pool)?;
        let row = NewCheckInRow {
            user_id: upsert.user_id,
            date: upsert.date,
            check_in: upsert.check_in,
            status: upsert.status.as_str(),
            work_mode: upsert.work_mode.as_str(),
            verification_method: upsert.verification_method.as_ref().map(|m| m.as_str()),
            location: upsert.location.as_deref(),
            created_at: upsert.check_in,
            updated_at: upsert.check_in,
        };

        use diesel::query_dsl::methods::FilterDsl;

        diesel::insert_into(attendance_records::table)
            .values(&row)
            .on_conflict((attendance_records::user_id, attendance_records::date))
            .do_update()
            .set((
                attendance_records::check_in.eq(excluded(attendance_records::check_in)),
                attendance_records::status.eq(excluded(attendance_records::status)),
                attendance_records::work_mode.eq(excluded(attendance_records::work_mode)),
                attendance_records::verification_method.eq(excluded(attendance_records::verification_method)),
                attendance_records::location.eq(excluded(attendance_records::location)),
                attendance_records::updated_at.eq(excluded(attendance_records::updated_at)),
            ))
            .filter(attendance_records::check_in.is_null().or(overwrite.into_sql::<Bool>()))
            .returning(AttendanceRow::as_returning())
            .get_result(&mut conn)
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    fn find_for_day(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Option<AttendanceRecord>> {
        let mut conn = checkout(&self.pool)?;
        attendance_records::table
            .filter(attendance_records::user_id.eq(user_id))
            .filter(attendance_records::date.eq(date))
            .select(AttendanceRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    fn record_check_out(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Option<AttendanceRecord>> {
        let mut conn = checkout(&self.pool)?;
        let target = attendance_records::table
            .filter(attendance_records::id.eq(id))
            .filter(attendance_records::check_in.is_not_null());

        let row = match notes {
            Some(notes) => diesel::update(target)
                .set((
                    attendance_records::check_out.eq(at),
                    attendance_records::notes.eq(notes),
                    attendance_records::updated_at.eq(at),
                ))
                .returning(AttendanceRow::as_returning())
                .get_result(&mut conn)
                .optional()?,
            None => diesel::update(target)
                .set((
                    attendance_records::check_out.eq(at),
                    attendance_records::updated_at.eq(at),
                ))
                .returning(AttendanceRow::as_returning())
                .get_result(&mut conn)
                .optional()?,
        };
        row.map(AttendanceRecord::try_from).transpose()
    }

    fn history(&self, user_id: Uuid, limit: i64, offset: i64) -> AppResult<(Vec<AttendanceRecord>, i64)> {
        let mut conn = checkout(&self.pool)?;

        let total: i64 = attendance_records::table
            .filter(attendance_records::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)?;

        let items = attendance_records::table
            .filter(attendance_records::user_id.eq(user_id))
            .order(attendance_records::date.desc())
            .limit(limit)
            .offset(offset)
            .select(AttendanceRow::as_select())
            .load(&mut conn)?
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((items, total))
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = check_in_windows)]
struct WindowRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    description: Option<String>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    days_of_week: Vec<i16>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WindowRow> for CheckInWindow {
    type Error = AppError;

    fn try_from(row: WindowRow) -> Result<Self, Self::Error> {
        let days_of_week = row
            .days_of_week
            .iter()
            .map(|&d| u8::try_from(d).ok().filter(|d| *d <= 6))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| AppError::internal(format!("corrupt window row {}: bad days_of_week", row.id)))?;
        Ok(CheckInWindow {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            description: row.description,
            start_time: row.start_time,
            end_time: row.end_time,
            days_of_week,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = check_in_windows)]
struct NewWindowRow<'a> {
    company_id: Uuid,
    name: &'a str,
    description: Option<&'a str>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    days_of_week: Vec<i16>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = check_in_windows, treat_none_as_null = true)]
struct WindowChangeset<'a> {
    name: &'a str,
    description: Option<&'a str>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    days_of_week: Vec<i16>,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

fn days_column(spec: &WindowSpec) -> Vec<i16> {
    spec.days_of_week.iter().map(|&d| i16::from(d)).collect()
}

pub struct PgWindowStore {
    pool: DbPool,
}

impl PgWindowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl WindowStore for PgWindowStore {
    fn insert(&self, company_id: Uuid, spec: &WindowSpec, now: DateTime<Utc>) -> AppResult<CheckInWindow> {
        let mut conn = checkout(&self.pool)?;
        let row = NewWindowRow {
            company_id,
            name: &spec.name,
            description: spec.description.as_deref(),
            start_time: spec.start_time,
            end_time: spec.end_time,
            days_of_week: days_column(spec),
            is_active: spec.is_active,
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(check_in_windows::table)
            .values(&row)
            .returning(WindowRow::as_returning())
            .get_result(&mut conn)?
            .try_into()
    }

    fn update(
        &self,
        company_id: Uuid,
        id: Uuid,
        spec: &WindowSpec,
        now: DateTime<Utc>,
    ) -> AppResult<Option<CheckInWindow>> {
        let mut conn = checkout(&self.pool)?;
        let changes = WindowChangeset {
            name: &spec.name,
            description: spec.description.as_deref(),
            start_time: spec.start_time,
            end_time: spec.end_time,
            days_of_week: days_column(spec),
            is_active: spec.is_active,
            updated_at: now,
        };

        diesel::update(
            check_in_windows::table
                .filter(check_in_windows::id.eq(id))
                .filter(check_in_windows::company_id.eq(company_id)),
        )
        .set(&changes)
        .returning(WindowRow::as_returning())
        .get_result(&mut conn)
        .optional()?
        .map(CheckInWindow::try_from)
        .transpose()
    }

    fn delete(&self, company_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut conn = checkout(&self.pool)?;
        let deleted = diesel::delete(
            check_in_windows::table
                .filter(check_in_windows::id.eq(id))
                .filter(check_in_windows::company_id.eq(company_id)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn list(&self, company_id: Uuid) -> AppResult<Vec<CheckInWindow>> {
        let mut conn = checkout(&self.pool)?;
        check_in_windows::table
            .filter(check_in_windows::company_id.eq(company_id))
            .order((check_in_windows::start_time.asc(), check_in_windows::name.asc()))
            .select(WindowRow::as_select())
            .load(&mut conn)?
            .into_iter()
            .map(CheckInWindow::try_from)
            .collect()
    }
}
