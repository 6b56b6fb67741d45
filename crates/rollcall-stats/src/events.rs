//! Attendance event reads.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::filter::{SqlFilter, MAX_IDS_PER_QUERY};
use crate::models::{AttendanceEvent, AttendanceStatus};

/// Read attendance events for the given course assignments.
///
/// With `student_ids`, only events of those students are returned. Empty
/// inputs short-circuit without touching the store. Events come back in no
/// particular order.
pub fn read_events(
    conn: &Connection,
    assigned_course_ids: &BTreeSet<i64>,
    student_ids: Option<&BTreeSet<i64>>,
) -> Result<Vec<AttendanceEvent>> {
    if assigned_course_ids.is_empty() || student_ids.is_some_and(BTreeSet::is_empty) {
        return Ok(Vec::new());
    }

    let course_ids: Vec<i64> = assigned_course_ids.iter().copied().collect();
    let mut events = Vec::new();

    for chunk in course_ids.chunks(MAX_IDS_PER_QUERY) {
        let filter = SqlFilter::new().is_in("assigned_course_id", chunk.iter().copied());
        let sql = format!(
            "SELECT user_id, assigned_course_id, date, status FROM attendance{}",
            filter.where_clause()
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(filter.params(), |row| {
            let date: String = row.get(2)?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
            })?;
            let status: String = row.get(3)?;
            Ok(AttendanceEvent {
                student_id: row.get(0)?,
                assigned_course_id: row.get(1)?,
                date,
                status: AttendanceStatus::from_db(&status),
            })
        })?;

        for row in rows {
            let event = row?;
            if student_ids.is_none_or(|ids| ids.contains(&event.student_id)) {
                events.push(event);
            }
        }
    }

    debug!(
        assignments = assigned_course_ids.len(),
        students = student_ids.map(BTreeSet::len),
        events = events.len(),
        "read attendance events"
    );
    Ok(events)
}
