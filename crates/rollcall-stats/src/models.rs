//! Data models for attendance statistics.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Label used wherever a value cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Attendance status recorded for one student in one class session.
///
/// Statuses other than present/absent/late are kept verbatim in
/// [`AttendanceStatus::Other`]; they count toward totals but toward no
/// individual bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Other(String),
}

impl AttendanceStatus {
    /// Parse the status column as stored (case-insensitive).
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Self::Present,
            "absent" => Self::Absent,
            "late" => Self::Late,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Value written to the status column.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attendance record: a student in one session of an assigned course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Student (user) id
    pub student_id: i64,

    /// Course assignment the session belongs to
    pub assigned_course_id: i64,

    /// Calendar date of the session
    pub date: NaiveDate,

    /// Recorded status
    pub status: AttendanceStatus,
}

impl AttendanceEvent {
    /// Create a new event.
    pub fn new(
        student_id: i64,
        assigned_course_id: i64,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> Self {
        Self {
            student_id,
            assigned_course_id,
            date,
            status,
        }
    }
}

/// Academic program (e.g. "BS Computer Science").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Section of a program. The name encodes the year level ("3-1").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub program_id: i64,
    pub name: String,
}

/// Course offered by a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub program_id: i64,
    pub code: String,
    pub name: String,
}

/// A course taught to a section in a given academic year and semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAssignment {
    pub id: i64,
    pub course_id: i64,
    pub section_id: i64,

    /// e.g. "2024-2025"
    pub academic_year: String,

    /// e.g. "1st Semester"
    pub semester: String,

    pub instructor_id: Option<i64>,
    pub room: Option<String>,
}

impl CourseAssignment {
    /// Create an assignment without instructor or room.
    pub fn new(
        course_id: i64,
        section_id: i64,
        academic_year: impl Into<String>,
        semester: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            course_id,
            section_id,
            academic_year: academic_year.into(),
            semester: semester.into(),
            instructor_id: None,
            room: None,
        }
    }

    /// Set the instructor.
    pub fn with_instructor(mut self, instructor_id: i64) -> Self {
        self.instructor_id = Some(instructor_id);
        self
    }

    /// Set the room.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }
}

/// Present/absent/late counts and the present rate for a set of events.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RateSummary {
    pub present: usize,
    pub absent: usize,
    pub late: usize,

    /// All events, including unknown statuses
    pub total: usize,

    /// `present / total * 100`, one decimal; 0 when `total` is 0
    pub rate_percent: f64,
}

impl RateSummary {
    /// Events whose status was none of present/absent/late.
    pub fn unknown(&self) -> usize {
        self.total - (self.present + self.absent + self.late)
    }

    /// Rate formatted for display, e.g. `"66.7%"`.
    pub fn display_rate(&self) -> String {
        format_percent(self.rate_percent)
    }
}

/// Dual-view rates used in per-course breakdowns.
///
/// Late counts toward `present_rate` but not toward `absent_rate`, so the two
/// do not have to sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CourseRates {
    /// `(present + late) / total * 100`, one decimal
    pub present_rate: f64,

    /// `absent / total * 100`, one decimal
    pub absent_rate: f64,
}

/// Per-course line of a section breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseBreakdown {
    pub assigned_course_id: i64,
    pub course_code: String,
    pub course_name: String,
    pub academic_year: String,
    pub semester: String,
    pub summary: RateSummary,
    pub rates: CourseRates,
}

/// Rate summary for one year level of a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearLevelRate {
    pub year_level: String,
    pub summary: RateSummary,
}

/// One (year level, month) bucket of the monthly aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRate {
    pub year_level: String,

    /// Three-letter month abbreviation ("Mar")
    pub month: String,

    pub year: i32,
    pub total_records: usize,
    pub present_count: usize,
    pub rate_percent: f64,
}

/// Year level × month pivot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlySeries {
    /// Year-level labels in encounter order
    pub year_levels: Vec<String>,

    /// Month abbreviations in chronological order, duplicates collapsed
    pub months: Vec<String>,

    /// Rates per year level, aligned with `months`
    pub series: BTreeMap<String, Vec<f64>>,

    /// Raw buckets before alignment and collapsing, chronological
    pub buckets: Vec<MonthlyRate>,
}

impl MonthlySeries {
    /// True when no month had any event.
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Series for one year level.
    pub fn series_for(&self, year_level: &str) -> Option<&[f64]> {
        self.series.get(year_level).map(Vec::as_slice)
    }
}

/// Headline figures, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetrics {
    /// e.g. `"82.3% (March 2025)"`
    pub current_month: String,
    pub previous_month: String,
    pub best_month: String,
    pub lowest_month: String,

    /// Weekday name, e.g. `"Monday"`
    pub most_active_day: String,
}

impl KeyMetrics {
    /// The record returned when there are no events at all.
    pub fn not_available() -> Self {
        Self {
            current_month: NOT_AVAILABLE.to_string(),
            previous_month: NOT_AVAILABLE.to_string(),
            best_month: NOT_AVAILABLE.to_string(),
            lowest_month: NOT_AVAILABLE.to_string(),
            most_active_day: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Format a rounded rate with a literal `%` suffix.
pub fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate)
}
