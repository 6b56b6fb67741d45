//! Plain-text rendering of reports.

use std::fmt;

use rollcall_stats::{CourseBreakdown, MonthlySeries, ScopeReport, TermFilter};

/// Printed when a scope resolves to nothing or holds no attendance.
pub const NO_DATA: &str = "No data for this selection";

/// Text form of a program or section report.
pub struct ReportText<'a>(pub &'a ScopeReport);

impl fmt::Display for ReportText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let stats = &report.statistics;

        writeln!(f, "{}{}", capitalize(&report.anchor.to_string()), term_suffix(&report.filter))?;
        writeln!(
            f,
            "Students: {}  Course assignments: {}",
            report.student_count, report.assignment_count
        )?;
        writeln!(
            f,
            "Attendance: {} ({} present, {} absent, {} late, {} records)",
            stats.display_rate(),
            stats.present,
            stats.absent,
            stats.late,
            stats.total
        )?;

        if !report.monthly.is_empty() {
            writeln!(f)?;
            writeln!(f, "Monthly attendance")?;
            monthly_table(f, &report.monthly)?;
        }

        let metrics = &report.key_metrics;
        writeln!(f)?;
        writeln!(f, "Key metrics")?;
        writeln!(f, "  Current month:   {}", metrics.current_month)?;
        writeln!(f, "  Previous month:  {}", metrics.previous_month)?;
        writeln!(f, "  Best month:      {}", metrics.best_month)?;
        writeln!(f, "  Lowest month:    {}", metrics.lowest_month)?;
        writeln!(f, "  Most active day: {}", metrics.most_active_day)
    }
}

/// Year levels as rows, months as columns.
fn monthly_table(f: &mut fmt::Formatter<'_>, monthly: &MonthlySeries) -> fmt::Result {
    let label_width = monthly
        .year_levels
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(0);

    write!(f, "{:label_width$}", "")?;
    for month in &monthly.months {
        write!(f, " {:>7}", month)?;
    }
    writeln!(f)?;

    for level in &monthly.year_levels {
        write!(f, "{:label_width$}", level)?;
        for rate in monthly.series_for(level).unwrap_or_default() {
            write!(f, " {:>6.1}%", rate)?;
        }
        writeln!(f)?;
    }
    Ok(())
}

/// Text form of a section's per-course breakdown.
pub struct BreakdownText<'a> {
    pub section_id: i64,
    pub filter: &'a TermFilter,
    pub lines: &'a [CourseBreakdown],
}

impl fmt::Display for BreakdownText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Section {}{}", self.section_id, term_suffix(self.filter))?;
        writeln!(
            f,
            "{:<10} {:<32} {:>8} {:>8} {:>8}",
            "Code", "Course", "Records", "Present", "Absent"
        )?;
        for line in self.lines {
            writeln!(
                f,
                "{:<10} {:<32} {:>8} {:>7.1}% {:>7.1}%",
                line.course_code,
                truncate(&line.course_name, 32),
                line.summary.total,
                line.rates.present_rate,
                line.rates.absent_rate
            )?;
        }
        Ok(())
    }
}

fn term_suffix(filter: &TermFilter) -> String {
    match (filter.academic_year(), filter.semester()) {
        (Some(year), Some(semester)) => format!(" ({year}, {semester})"),
        (Some(year), None) => format!(" ({year})"),
        (None, Some(semester)) => format!(" ({semester})"),
        (None, None) => String::new(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_stats::{
        AttendanceEvent, AttendanceStatus, KeyMetrics, RateSummary, ScopeAnchor, aggregate_monthly,
        compute_course_rates, year_level_label,
    };
    use std::collections::HashMap;

    use chrono::NaiveDate;

    fn sample_report() -> ScopeReport {
        let events = vec![
            AttendanceEvent::new(1, 7, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), AttendanceStatus::Present),
            AttendanceEvent::new(2, 7, NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(), AttendanceStatus::Absent),
        ];
        let sections = HashMap::from([(7, "3-1".to_string())]);
        ScopeReport {
            anchor: ScopeAnchor::Section(12),
            filter: TermFilter::new(Some("2024-2025"), Some("2nd Semester")).unwrap(),
            student_count: 2,
            assignment_count: 1,
            statistics: RateSummary {
                present: 1,
                absent: 1,
                late: 0,
                total: 2,
                rate_percent: 50.0,
            },
            monthly: aggregate_monthly(&events, &sections, year_level_label),
            key_metrics: KeyMetrics::not_available(),
        }
    }

    #[test]
    fn test_scope_report_text() {
        let report = sample_report();
        let text = ReportText(&report).to_string();
        assert!(text.starts_with("Section 12 (2024-2025, 2nd Semester)\n"));
        assert!(text.contains("Attendance: 50.0% (1 present, 1 absent, 0 late, 2 records)"));
        assert!(text.contains("3rd Year  100.0%    0.0%"));
        assert!(text.contains("Most active day: N/A"));
        assert!(text.ends_with("Most active day: N/A\n"));
    }

    #[test]
    fn test_course_breakdown_text() {
        let events = vec![AttendanceEvent::new(
            1,
            7,
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            AttendanceStatus::Late,
        )];
        let line = CourseBreakdown {
            assigned_course_id: 7,
            course_code: "CS301".to_string(),
            course_name: "Operating Systems".to_string(),
            academic_year: "2024-2025".to_string(),
            semester: "2nd Semester".to_string(),
            summary: rollcall_stats::compute_rate(&events),
            rates: compute_course_rates(&events),
        };
        let lines = [line];
        let text = BreakdownText {
            section_id: 12,
            filter: &TermFilter::any(),
            lines: &lines,
        }
        .to_string();
        assert!(text.starts_with("Section 12\n"));
        assert!(text.contains("CS301"));
        assert!(text.contains("100.0%"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(capitalize("program 4"), "Program 4");
        assert_eq!(truncate("Intro", 32), "Intro");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
