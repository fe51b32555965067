use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use roster_shared::errors::{AppError, AppResult, ErrorCode};

/// Closed string-backed enums stored as varchar columns.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("unknown ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

string_enum!(AttendanceStatus {
    Present => "present",
    Absent => "absent",
    Late => "late",
    HalfDay => "half-day",
    Leave => "leave",
    Holiday => "holiday",
});

string_enum!(WorkMode {
    Office => "office",
    Remote => "remote",
    Hybrid => "hybrid",
});

string_enum!(VerificationMethod {
    Manual => "manual",
    Gps => "gps",
    QrCode => "qr-code",
    Biometric => "biometric",
});

/// One user's attendance for one calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub work_mode: WorkMode,
    pub verification_method: Option<VerificationMethod>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by a check-in; keyed on (user_id, date).
#[derive(Debug, Clone)]
pub struct CheckInUpsert {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub check_in: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub work_mode: WorkMode,
    pub verification_method: Option<VerificationMethod>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInDetails {
    pub work_mode: WorkMode,
    #[serde(default)]
    pub verification_method: Option<VerificationMethod>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckOutDetails {
    #[serde(default)]
    pub notes: Option<String>,
}

/// A named time-of-day range during which check-ins count as on time.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInWindow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// 0 = Sunday .. 6 = Saturday, sorted and deduplicated.
    pub days_of_week: Vec<u8>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckInWindow {
    /// Half-open `[start, end)` on an active day.
    pub fn contains(&self, weekday: u8, time: NaiveTime) -> bool {
        self.is_active
            && self.days_of_week.contains(&weekday)
            && self.start_time <= time
            && time < self.end_time
    }
}

/// A window definition that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub name: String,
    pub description: Option<String>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub days_of_week: Vec<u8>,
    pub is_active: bool,
}

pub const WEEKDAYS: [u8; 5] = [1, 2, 3, 4, 5];

/// Window definition as submitted by a client.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WindowInput {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `HH:MM` or `HH:MM:SS`.
    pub start_time: String,
    pub end_time: String,
    /// Monday to Friday when omitted. An explicit empty list never matches.
    #[serde(default)]
    pub days_of_week: Option<Vec<i64>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl WindowInput {
    /// Check every field and collect all problems into one `InvalidWindow` error.
    pub fn into_spec(mut self) -> AppResult<WindowSpec> {
        let mut problems = serde_json::Map::new();

        self.name = self.name.trim().to_string();
        if let Err(e) = self.validate() {
            for (field, errors) in e.field_errors() {
                let messages: Vec<String> = errors.iter().map(|err| err.code.to_string()).collect();
                problems.insert(field.to_string(), json!(messages));
            }
        }

        let start = parse_time_of_day(&self.start_time);
        let end = parse_time_of_day(&self.end_time);
        if start.is_none() {
            problems.insert("start_time".into(), json!(["expected HH:MM"]));
        }
        if end.is_none() {
            problems.insert("end_time".into(), json!(["expected HH:MM"]));
        }
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                problems.insert("end_time".into(), json!(["must be after start_time"]));
            }
        }

        let requested = self.days_of_week.unwrap_or_else(|| WEEKDAYS.iter().map(|&d| d as i64).collect());
        let out_of_range: Vec<i64> = requested.iter().copied().filter(|d| !(0..=6).contains(d)).collect();
        if !out_of_range.is_empty() {
            problems.insert("days_of_week".into(), json!({ "out_of_range": out_of_range }));
        }

        match (start, end) {
            (Some(start_time), Some(end_time)) if problems.is_empty() => {
                let mut days_of_week: Vec<u8> = requested.into_iter().map(|d| d as u8).collect();
                days_of_week.sort_unstable();
                days_of_week.dedup();
                Ok(WindowSpec {
                    name: self.name,
                    description: self.description.filter(|d| !d.trim().is_empty()),
                    start_time,
                    end_time,
                    days_of_week,
                    is_active: self.is_active,
                })
            }
            _ => Err(AppError::with_details(
                ErrorCode::InvalidWindow,
                "invalid check-in window",
                serde_json::Value::Object(problems),
            )),
        }
    }
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Canned windows that instantiate as ordinary Monday to Friday windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPreset {
    Morning,
    Standard,
    Flexible,
    Afternoon,
}

impl WindowPreset {
    pub const ALL: [WindowPreset; 4] = [Self::Morning, Self::Standard, Self::Flexible, Self::Afternoon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Standard => "standard",
            Self::Flexible => "flexible",
            Self::Afternoon => "afternoon",
        }
    }

    pub fn spec(&self) -> WindowSpec {
        let (name, start, end) = match self {
            Self::Morning => ("Morning Shift", (8, 0), (10, 0)),
            Self::Standard => ("Standard Hours", (9, 0), (9, 30)),
            Self::Flexible => ("Flexible Hours", (7, 0), (11, 0)),
            Self::Afternoon => ("Afternoon Shift", (13, 0), (14, 0)),
        };
        WindowSpec {
            name: name.to_string(),
            description: None,
            start_time: hm(start),
            end_time: hm(end),
            days_of_week: WEEKDAYS.to_vec(),
            is_active: true,
        }
    }
}

fn hm((hour, minute): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

impl std::str::FromStr for WindowPreset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::new(ErrorCode::UnknownPreset, format!("unknown window preset: {s}")))
    }
}
