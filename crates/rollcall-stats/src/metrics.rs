//! Headline attendance figures for dashboards.
//!
//! Unlike the monthly series, months here are not split by year level. Ties
//! between months go to the oldest month and ties between weekdays go to the
//! earliest weekday, so the summary is deterministic for a given event set.

use std::collections::BTreeMap;

use chrono::{Datelike, Local, NaiveDate};
use tracing::debug;

use crate::models::{format_percent, AttendanceEvent, KeyMetrics, NOT_AVAILABLE};
use crate::monthly::month_name;
use crate::rate::Tally;

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Summarize `events` relative to the calendar month containing `today`.
///
/// An empty event list yields [`KeyMetrics::not_available`]. Otherwise a
/// current or previous month without events is reported as `0.0%`.
pub fn summarize(events: &[AttendanceEvent], today: NaiveDate) -> KeyMetrics {
    if events.is_empty() {
        return KeyMetrics::not_available();
    }

    let mut months: BTreeMap<(i32, u32), Tally> = BTreeMap::new();
    let mut weekdays = [Tally::default(); 7];

    for event in events {
        months
            .entry((event.date.year(), event.date.month()))
            .or_default()
            .add(&event.status);
        weekdays[event.date.weekday().num_days_from_monday() as usize].add(&event.status);
    }

    let current = (today.year(), today.month());
    let current_month = month_label(&months, current);

    let previous_month = today
        .with_day(1)
        .and_then(|first| first.pred_opt())
        .map(|last| month_label(&months, (last.year(), last.month())))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let (best, lowest) = extremes(&months);

    let metrics = KeyMetrics {
        current_month,
        previous_month,
        best_month: best.map_or_else(|| NOT_AVAILABLE.to_string(), format_month),
        lowest_month: lowest.map_or_else(|| NOT_AVAILABLE.to_string(), format_month),
        most_active_day: most_active_day(&weekdays).to_string(),
    };

    debug!(
        events = events.len(),
        months = months.len(),
        best = %metrics.best_month,
        "summarized key metrics"
    );
    metrics
}

/// [`summarize`] against the local calendar date.
pub fn summarize_now(events: &[AttendanceEvent]) -> KeyMetrics {
    summarize(events, Local::now().date_naive())
}

fn month_label(months: &BTreeMap<(i32, u32), Tally>, key: (i32, u32)) -> String {
    let rate = months.get(&key).map(Tally::rate).unwrap_or(0.0);
    format_month((key, rate))
}

fn format_month(((year, month), rate): ((i32, u32), f64)) -> String {
    format!("{} ({} {})", format_percent(rate), month_name(month), year)
}

type MonthRate = ((i32, u32), f64);

/// Highest and lowest month, first chronological occurrence on ties.
fn extremes(months: &BTreeMap<(i32, u32), Tally>) -> (Option<MonthRate>, Option<MonthRate>) {
    let mut best: Option<MonthRate> = None;
    let mut lowest: Option<MonthRate> = None;

    for (&key, tally) in months {
        let rate = tally.rate();
        if best.is_none_or(|(_, r)| rate > r) {
            best = Some((key, rate));
        }
        if lowest.is_none_or(|(_, r)| rate < r) {
            lowest = Some((key, rate));
        }
    }
    (best, lowest)
}

fn most_active_day(weekdays: &[Tally; 7]) -> &'static str {
    let mut best: Option<(usize, f64)> = None;
    for (index, tally) in weekdays.iter().enumerate() {
        if tally.total == 0 {
            continue;
        }
        let rate = tally.rate();
        if best.is_none_or(|(_, r)| rate > r) {
            best = Some((index, rate));
        }
    }
    best.map_or(NOT_AVAILABLE, |(index, _)| WEEKDAYS[index])
}
