//! Scope resolution: which students and which course assignments a program
//! or section report covers.
//!
//! Only non-deleted programs, sections, courses and course assignments are
//! considered, and only active, non-deleted students. A scope whose anchor
//! does not resolve is returned empty rather than as an error.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StatsError};
use crate::filter::{SqlFilter, MAX_IDS_PER_QUERY};
use crate::models::{CourseAssignment, Section};

/// The dimension a report is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScopeAnchor {
    Program(i64),
    Section(i64),
}

impl ScopeAnchor {
    /// Raw id of the anchor row.
    pub fn id(self) -> i64 {
        match self {
            Self::Program(id) | Self::Section(id) => id,
        }
    }
}

impl fmt::Display for ScopeAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program(id) => write!(f, "program {id}"),
            Self::Section(id) => write!(f, "section {id}"),
        }
    }
}

/// Optional academic year / semester restriction on course assignments.
///
/// Values are matched exactly. Construct through [`TermFilter::new`] so
/// malformed values are rejected up front instead of silently matching no
/// rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermFilter {
    academic_year: Option<String>,
    semester: Option<String>,
}

impl TermFilter {
    /// No restriction.
    pub fn any() -> Self {
        Self::default()
    }

    /// Validate and build a filter.
    ///
    /// Both values are matched by exact string, so any non-blank value
    /// without surrounding whitespace is accepted.
    pub fn new(academic_year: Option<&str>, semester: Option<&str>) -> Result<Self> {
        if let Some(year) = academic_year {
            validate_term_value("academic_year", year)?;
        }
        if let Some(semester) = semester {
            validate_term_value("semester", semester)?;
        }
        Ok(Self {
            academic_year: academic_year.map(str::to_string),
            semester: semester.map(str::to_string),
        })
    }

    pub fn academic_year(&self) -> Option<&str> {
        self.academic_year.as_deref()
    }

    pub fn semester(&self) -> Option<&str> {
        self.semester.as_deref()
    }

    /// True when neither dimension is restricted.
    pub fn is_unrestricted(&self) -> bool {
        self.academic_year.is_none() && self.semester.is_none()
    }
}

fn validate_term_value(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StatsError::malformed(field, "must not be blank"));
    }
    if value.trim() != value {
        return Err(StatsError::malformed(
            field,
            format!("unexpected surrounding whitespace in {value:?}"),
        ));
    }
    Ok(())
}

/// Students and course assignments covered by a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedScope {
    pub anchor: ScopeAnchor,

    /// Live sections in the scope, by id
    pub sections: BTreeMap<i64, Section>,

    /// Active students enrolled in those sections
    pub student_ids: BTreeSet<i64>,

    /// Live course assignments for those sections, after the term filter
    pub assignments: BTreeMap<i64, CourseAssignment>,
}

impl ResolvedScope {
    fn empty(anchor: ScopeAnchor) -> Self {
        Self {
            anchor,
            sections: BTreeMap::new(),
            student_ids: BTreeSet::new(),
            assignments: BTreeMap::new(),
        }
    }

    /// True when the anchor did not resolve to any live section.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Ids of the course assignments in scope.
    pub fn assigned_course_ids(&self) -> BTreeSet<i64> {
        self.assignments.keys().copied().collect()
    }

    /// Section name for each assigned course, used to derive year levels.
    pub fn section_names_by_assignment(&self) -> HashMap<i64, String> {
        self.assignments
            .values()
            .filter_map(|a| {
                self.sections
                    .get(&a.section_id)
                    .map(|s| (a.id, s.name.clone()))
            })
            .collect()
    }
}

/// Resolve a program or section to its students and course assignments.
pub fn resolve_scope(
    conn: &Connection,
    anchor: ScopeAnchor,
    filter: &TermFilter,
) -> Result<ResolvedScope> {
    if anchor.id() <= 0 {
        return Err(StatsError::malformed(
            "scope",
            format!("{anchor} is not a valid id"),
        ));
    }

    let sections = load_sections(conn, anchor)?;
    if sections.is_empty() {
        debug!(%anchor, "scope resolved to no live sections");
        return Ok(ResolvedScope::empty(anchor));
    }

    let section_ids: Vec<i64> = sections.keys().copied().collect();
    let student_ids = load_students(conn, &section_ids)?;
    let assignments = load_assignments(conn, &section_ids, filter)?;

    debug!(
        %anchor,
        sections = sections.len(),
        students = student_ids.len(),
        assignments = assignments.len(),
        academic_year = filter.academic_year(),
        semester = filter.semester(),
        "resolved scope"
    );

    Ok(ResolvedScope {
        anchor,
        sections,
        student_ids,
        assignments,
    })
}

fn load_sections(conn: &Connection, anchor: ScopeAnchor) -> Result<BTreeMap<i64, Section>> {
    let filter = SqlFilter::new()
        .not_deleted("s.is_deleted")
        .not_deleted("p.is_deleted");
    let filter = match anchor {
        ScopeAnchor::Program(id) => filter.eq("s.program_id", id),
        ScopeAnchor::Section(id) => filter.eq("s.id", id),
    };

    let sql = format!(
        "SELECT s.id, s.program_id, s.name
         FROM sections s
         JOIN programs p ON p.id = s.program_id{}",
        filter.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let sections = stmt
        .query_map(filter.params(), |row| {
            Ok(Section {
                id: row.get(0)?,
                program_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .map(|r| r.map(|s| (s.id, s)))
        .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
    Ok(sections)
}

fn load_students(conn: &Connection, section_ids: &[i64]) -> Result<BTreeSet<i64>> {
    let mut ids = BTreeSet::new();
    for chunk in section_ids.chunks(MAX_IDS_PER_QUERY) {
        let filter = SqlFilter::new()
            .eq("role", "student".to_string())
            .is_set("is_active")
            .not_deleted("is_deleted")
            .is_in("section_id", chunk.iter().copied());

        let sql = format!("SELECT id FROM users{}", filter.where_clause());
        let mut stmt = conn.prepare(&sql)?;
        for id in stmt.query_map(filter.params(), |row| row.get(0))? {
            ids.insert(id?);
        }
    }
    Ok(ids)
}

fn load_assignments(
    conn: &Connection,
    section_ids: &[i64],
    term: &TermFilter,
) -> Result<BTreeMap<i64, CourseAssignment>> {
    let mut assignments = BTreeMap::new();
    for chunk in section_ids.chunks(MAX_IDS_PER_QUERY) {
        let filter = SqlFilter::new()
            .not_deleted("ca.is_deleted")
            .not_deleted("c.is_deleted")
            .is_in("ca.section_id", chunk.iter().copied())
            .eq_opt("ca.academic_year", term.academic_year())
            .eq_opt("ca.semester", term.semester());

        let sql = format!(
            "SELECT ca.id, ca.course_id, ca.section_id, ca.academic_year, ca.semester,
                    ca.instructor_id, ca.room
             FROM course_assignments ca
             JOIN courses c ON c.id = ca.course_id{}",
            filter.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(filter.params(), |row| {
            Ok(CourseAssignment {
                id: row.get(0)?,
                course_id: row.get(1)?,
                section_id: row.get(2)?,
                academic_year: row.get(3)?,
                semester: row.get(4)?,
                instructor_id: row.get(5)?,
                room: row.get(6)?,
            })
        })?;
        for row in rows {
            let assignment = row?;
            assignments.insert(assignment.id, assignment);
        }
    }
    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_filter_accepts_well_formed_values() {
        let filter = TermFilter::new(Some("2024-2025"), Some("1st Semester")).unwrap();
        assert_eq!(filter.academic_year(), Some("2024-2025"));
        assert_eq!(filter.semester(), Some("1st Semester"));
        assert!(!filter.is_unrestricted());
        assert!(TermFilter::any().is_unrestricted());
    }

    #[test]
    fn test_term_filter_matches_stored_year_formats_verbatim() {
        for stored in ["2024-2026", "AY 2024-2025", "2024"] {
            let filter = TermFilter::new(Some(stored), None).unwrap();
            assert_eq!(filter.academic_year(), Some(stored));
        }
    }

    #[test]
    fn test_term_filter_rejects_blank_or_padded_years() {
        for bad in ["", "  ", " 2024-2025", "2024-2025\n"] {
            let err = TermFilter::new(Some(bad), None).unwrap_err();
            assert!(
                matches!(err, StatsError::MalformedInput { field: "academic_year", .. }),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_term_filter_rejects_blank_semester() {
        assert!(TermFilter::new(None, Some("")).is_err());
        assert!(TermFilter::new(None, Some("   ")).is_err());
        assert!(TermFilter::new(None, Some("2nd Semester ")).is_err());
    }

    #[test]
    fn test_anchor_display_and_id() {
        assert_eq!(ScopeAnchor::Program(4).to_string(), "program 4");
        assert_eq!(ScopeAnchor::Section(9).id(), 9);
    }

    #[test]
    fn test_non_positive_anchor_is_malformed() {
        let conn = Connection::open_in_memory().unwrap();
        let err = resolve_scope(&conn, ScopeAnchor::Section(0), &TermFilter::any()).unwrap_err();
        assert!(matches!(err, StatsError::MalformedInput { field: "scope", .. }));
    }
}
