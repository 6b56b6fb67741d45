//! Attendance rate calculation.

use crate::models::{AttendanceEvent, AttendanceStatus, CourseRates, RateSummary};

/// Round to one decimal place, ties to even.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// `part / total * 100` rounded to one decimal, or 0 when `total` is 0.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_one_decimal(part as f64 / total as f64 * 100.0)
}

/// Running present/total count for one bucket.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Tally {
    pub(crate) total: usize,
    pub(crate) present: usize,
}

impl Tally {
    pub(crate) fn add(&mut self, status: &AttendanceStatus) {
        self.total += 1;
        if *status == AttendanceStatus::Present {
            self.present += 1;
        }
    }

    pub(crate) fn rate(&self) -> f64 {
        percentage(self.present, self.total)
    }
}

/// Count statuses and compute the present rate.
///
/// Unknown statuses are part of `total` but of no individual count.
pub fn compute_rate(events: &[AttendanceEvent]) -> RateSummary {
    let mut summary = RateSummary {
        total: events.len(),
        ..Default::default()
    };

    for event in events {
        match event.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::Late => summary.late += 1,
            AttendanceStatus::Other(_) => {}
        }
    }

    summary.rate_percent = percentage(summary.present, summary.total);
    summary
}

/// Dual view used for per-course breakdowns: late counts as present for
/// `present_rate`, and `absent_rate` is computed independently.
pub fn compute_course_rates(events: &[AttendanceEvent]) -> CourseRates {
    course_rates_from(&compute_rate(events))
}

/// Dual view from an existing summary.
pub fn course_rates_from(summary: &RateSummary) -> CourseRates {
    CourseRates {
        present_rate: percentage(summary.present + summary.late, summary.total),
        absent_rate: percentage(summary.absent, summary.total),
    }
}
