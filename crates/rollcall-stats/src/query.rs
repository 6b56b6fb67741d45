//! Query interface for attendance statistics.
//!
//! Every method resolves its scope and reads its events inside one read
//! transaction, so the figures in a result always come from a single
//! consistent view of the store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::AttendanceDatabase;
use crate::error::Result;
use crate::events::read_events;
use crate::filter::{SqlFilter, MAX_IDS_PER_QUERY};
use crate::metrics::summarize;
use crate::models::{
    AttendanceEvent, Course, CourseBreakdown, KeyMetrics, MonthlySeries, RateSummary,
    YearLevelRate,
};
use crate::monthly::aggregate_monthly;
use crate::rate::{compute_rate, course_rates_from};
use crate::scope::{resolve_scope, ResolvedScope, ScopeAnchor, TermFilter};
use crate::year_level::{year_level_label, OTHER_YEAR};

/// Statistics, monthly series and key metrics for one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeReport {
    pub anchor: ScopeAnchor,
    pub filter: TermFilter,
    pub student_count: usize,
    pub assignment_count: usize,
    pub statistics: RateSummary,
    pub monthly: MonthlySeries,
    pub key_metrics: KeyMetrics,
}

impl ScopeReport {
    /// False when the scope did not resolve or holds no attendance events.
    pub fn has_data(&self) -> bool {
        self.statistics.total > 0
    }
}

/// Query interface for attendance statistics.
pub struct StatsQuery<'a> {
    db: &'a AttendanceDatabase,
}

impl<'a> StatsQuery<'a> {
    /// Create a new query interface.
    pub fn new(db: &'a AttendanceDatabase) -> Self {
        Self { db }
    }

    /// Resolve a scope to its students and course assignments.
    pub fn resolve(&self, anchor: ScopeAnchor, filter: &TermFilter) -> Result<ResolvedScope> {
        self.db
            .with_read_transaction("resolve_scope", |conn| resolve_scope(conn, anchor, filter))
    }

    /// Flat statistics for a program.
    pub fn program_statistics(&self, program_id: i64, filter: &TermFilter) -> Result<RateSummary> {
        self.statistics(ScopeAnchor::Program(program_id), filter)
    }

    /// Flat statistics for a section.
    pub fn section_statistics(&self, section_id: i64, filter: &TermFilter) -> Result<RateSummary> {
        self.statistics(ScopeAnchor::Section(section_id), filter)
    }

    fn statistics(&self, anchor: ScopeAnchor, filter: &TermFilter) -> Result<RateSummary> {
        let summary = self.db.with_read_transaction("statistics", |conn| {
            let (_, events) = scoped_events(conn, anchor, filter)?;
            Ok(compute_rate(&events))
        })?;
        debug!(%anchor, total = summary.total, rate = summary.rate_percent, "computed statistics");
        Ok(summary)
    }

    /// Monthly rates per year level.
    pub fn monthly_series(&self, anchor: ScopeAnchor, filter: &TermFilter) -> Result<MonthlySeries> {
        self.db.with_read_transaction("monthly_series", |conn| {
            let (scope, events) = scoped_events(conn, anchor, filter)?;
            Ok(aggregate_monthly(
                &events,
                &scope.section_names_by_assignment(),
                year_level_label,
            ))
        })
    }

    /// Key metrics relative to `today`.
    pub fn key_metrics(
        &self,
        anchor: ScopeAnchor,
        filter: &TermFilter,
        today: NaiveDate,
    ) -> Result<KeyMetrics> {
        self.db.with_read_transaction("key_metrics", |conn| {
            let (_, events) = scoped_events(conn, anchor, filter)?;
            Ok(summarize(&events, today))
        })
    }

    /// Rate summary per year level of a program, "1st Year" first and
    /// [`OTHER_YEAR`] last. Year levels without events are omitted.
    pub fn year_level_rates(&self, program_id: i64, filter: &TermFilter) -> Result<Vec<YearLevelRate>> {
        let anchor = ScopeAnchor::Program(program_id);
        self.db.with_read_transaction("year_level_rates", |conn| {
            let (scope, events) = scoped_events(conn, anchor, filter)?;
            let sections = scope.section_names_by_assignment();

            let mut by_level: BTreeMap<&'static str, Vec<AttendanceEvent>> = BTreeMap::new();
            for event in events {
                let label = sections
                    .get(&event.assigned_course_id)
                    .map_or(OTHER_YEAR, |name| year_level_label(name));
                by_level.entry(label).or_default().push(event);
            }

            Ok(by_level
                .into_iter()
                .map(|(label, events)| YearLevelRate {
                    year_level: label.to_string(),
                    summary: compute_rate(&events),
                })
                .collect())
        })
    }

    /// Per-course figures for a section, ordered by course code.
    ///
    /// Every course assignment in scope gets a line, including those without
    /// any recorded attendance.
    pub fn section_course_breakdown(
        &self,
        section_id: i64,
        filter: &TermFilter,
    ) -> Result<Vec<CourseBreakdown>> {
        let anchor = ScopeAnchor::Section(section_id);
        let breakdown = self.db.with_read_transaction("section_course_breakdown", |conn| {
            let (scope, events) = scoped_events(conn, anchor, filter)?;
            let course_ids: BTreeSet<i64> = scope.assignments.values().map(|a| a.course_id).collect();
            let courses = load_courses(conn, &course_ids)?;

            let mut by_assignment: BTreeMap<i64, Vec<AttendanceEvent>> = BTreeMap::new();
            for event in events {
                by_assignment.entry(event.assigned_course_id).or_default().push(event);
            }

            let mut lines: Vec<CourseBreakdown> = scope
                .assignments
                .values()
                .filter_map(|assignment| {
                    let course = courses.get(&assignment.course_id)?;
                    let events = by_assignment
                        .get(&assignment.id)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    let summary = compute_rate(events);
                    Some(CourseBreakdown {
                        assigned_course_id: assignment.id,
                        course_code: course.code.clone(),
                        course_name: course.name.clone(),
                        academic_year: assignment.academic_year.clone(),
                        semester: assignment.semester.clone(),
                        summary,
                        rates: course_rates_from(&summary),
                    })
                })
                .collect();
            lines.sort_by(|a, b| {
                a.course_code
                    .cmp(&b.course_code)
                    .then(a.assigned_course_id.cmp(&b.assigned_course_id))
            });
            Ok(lines)
        })?;

        debug!(section_id, courses = breakdown.len(), "computed course breakdown");
        Ok(breakdown)
    }

    /// Statistics, monthly series and key metrics from one read.
    pub fn scope_report(
        &self,
        anchor: ScopeAnchor,
        filter: &TermFilter,
        today: NaiveDate,
    ) -> Result<ScopeReport> {
        let report = self.db.with_read_transaction("scope_report", |conn| {
            let (scope, events) = scoped_events(conn, anchor, filter)?;
            Ok(ScopeReport {
                anchor,
                filter: filter.clone(),
                student_count: scope.student_ids.len(),
                assignment_count: scope.assignments.len(),
                statistics: compute_rate(&events),
                monthly: aggregate_monthly(
                    &events,
                    &scope.section_names_by_assignment(),
                    year_level_label,
                ),
                key_metrics: summarize(&events, today),
            })
        })?;

        info!(
            %anchor,
            academic_year = filter.academic_year(),
            semester = filter.semester(),
            students = report.student_count,
            assignments = report.assignment_count,
            events = report.statistics.total,
            rate = report.statistics.rate_percent,
            "built scope report"
        );
        Ok(report)
    }
}

fn scoped_events(
    conn: &Connection,
    anchor: ScopeAnchor,
    filter: &TermFilter,
) -> Result<(ResolvedScope, Vec<AttendanceEvent>)> {
    let scope = resolve_scope(conn, anchor, filter)?;
    let events = read_events(conn, &scope.assigned_course_ids(), Some(&scope.student_ids))?;
    Ok((scope, events))
}

fn load_courses(conn: &Connection, course_ids: &BTreeSet<i64>) -> Result<BTreeMap<i64, Course>> {
    let ids: Vec<i64> = course_ids.iter().copied().collect();
    let mut courses = BTreeMap::new();

    for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
        let filter = SqlFilter::new()
            .not_deleted("is_deleted")
            .is_in("id", chunk.iter().copied());
        let sql = format!(
            "SELECT id, program_id, code, name FROM courses{}",
            filter.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(filter.params(), |row| {
            Ok(Course {
                id: row.get(0)?,
                program_id: row.get(1)?,
                code: row.get(2)?,
                name: row.get(3)?,
            })
        })?;
        for row in rows {
            let course = row?;
            courses.insert(course.id, course);
        }
    }
    Ok(courses)
}
