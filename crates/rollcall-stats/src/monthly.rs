//! Monthly attendance series per year level.
//!
//! Events are bucketed by (year level, calendar month). Only months with at
//! least one event appear on the month axis; within a month, a year level
//! without events gets 0 so every series stays aligned with the axis.
//!
//! The axis is labelled with three-letter abbreviations. When the same
//! abbreviation occurs twice (data spanning more than twelve months), the
//! later column is folded into the first: two positive rates are averaged,
//! and a zero never replaces a positive rate.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Month};
use tracing::debug;

use crate::models::{AttendanceEvent, MonthlyRate, MonthlySeries};
use crate::rate::{round_one_decimal, Tally};

/// Full English month name ("March").
pub fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown")
}

/// Three-letter month abbreviation ("Mar").
pub fn month_abbreviation(month: u32) -> &'static str {
    let name = month_name(month);
    name.get(..3).unwrap_or(name)
}

/// Fold a later duplicate-month rate into the first occurrence.
pub fn merge_duplicate_month(first: f64, later: f64) -> f64 {
    if first > 0.0 && later > 0.0 {
        round_one_decimal((first + later) / 2.0)
    } else if later > 0.0 {
        later
    } else {
        first
    }
}

/// Build the year level × month pivot.
///
/// `section_names` maps an assigned course id to the name of the section it
/// is taught to; `year_level_of` turns that name into a label (see
/// [`year_level_label`](crate::year_level_label)). Events whose assignment
/// has no known section are labelled from an empty name.
pub fn aggregate_monthly<F, S>(
    events: &[AttendanceEvent],
    section_names: &HashMap<i64, String>,
    year_level_of: F,
) -> MonthlySeries
where
    F: Fn(&str) -> S,
    S: Into<String>,
{
    let mut sorted: Vec<&AttendanceEvent> = events.iter().collect();
    sorted.sort_by_key(|e| (e.date, e.student_id, e.assigned_course_id));

    let mut year_levels: Vec<String> = Vec::new();
    let mut tallies: BTreeMap<(i32, u32), HashMap<String, Tally>> = BTreeMap::new();

    for event in sorted {
        let section = section_names
            .get(&event.assigned_course_id)
            .map(String::as_str)
            .unwrap_or_default();
        let label: String = year_level_of(section).into();
        if !year_levels.contains(&label) {
            year_levels.push(label.clone());
        }

        tallies
            .entry((event.date.year(), event.date.month()))
            .or_default()
            .entry(label)
            .or_default()
            .add(&event.status);
    }

    let mut buckets = Vec::new();
    for (&(year, month), by_level) in &tallies {
        for level in &year_levels {
            if let Some(tally) = by_level.get(level) {
                buckets.push(MonthlyRate {
                    year_level: level.clone(),
                    month: month_abbreviation(month).to_string(),
                    year,
                    total_records: tally.total,
                    present_count: tally.present,
                    rate_percent: tally.rate(),
                });
            }
        }
    }

    let mut months: Vec<String> = Vec::new();
    let mut series: BTreeMap<String, Vec<f64>> = year_levels
        .iter()
        .map(|level| (level.clone(), Vec::new()))
        .collect();
    let mut first_column: HashMap<&'static str, usize> = HashMap::new();

    for (&(_, month), by_level) in &tallies {
        let abbreviation = month_abbreviation(month);
        let rate_for = |level: &str| by_level.get(level).map(Tally::rate).unwrap_or(0.0);

        match first_column.get(abbreviation).copied() {
            None => {
                first_column.insert(abbreviation, months.len());
                months.push(abbreviation.to_string());
                for (level, rates) in series.iter_mut() {
                    rates.push(rate_for(level.as_str()));
                }
            }
            Some(column) => {
                debug!(month = abbreviation, "collapsing duplicate month column");
                for (level, rates) in series.iter_mut() {
                    rates[column] = merge_duplicate_month(rates[column], rate_for(level.as_str()));
                }
            }
        }
    }

    MonthlySeries {
        year_levels,
        months,
        series,
        buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use crate::year_level::year_level_label;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    const TAUGHT_TO_3_1: i64 = 10;
    const TAUGHT_TO_1_2: i64 = 20;

    fn sections() -> HashMap<i64, String> {
        HashMap::from([
            (TAUGHT_TO_3_1, "3-1".to_string()),
            (TAUGHT_TO_1_2, "1-2".to_string()),
        ])
    }

    fn event(student: i64, assigned: i64, date: (i32, u32, u32), present: bool) -> AttendanceEvent {
        AttendanceEvent::new(
            student,
            assigned,
            NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            if present {
                AttendanceStatus::Present
            } else {
                AttendanceStatus::Absent
            },
        )
    }

    /// `count` events on distinct days of one month, the first `present` present.
    fn month_events(
        student: i64,
        assigned: i64,
        year: i32,
        month: u32,
        count: u32,
        present: u32,
    ) -> Vec<AttendanceEvent> {
        (1..=count)
            .map(|day| event(student, assigned, (year, month, day), day <= present))
            .collect()
    }

    #[test]
    fn test_two_students_march_and_april() {
        let mut events = Vec::new();
        events.extend(month_events(1, TAUGHT_TO_3_1, 2025, 3, 5, 4));
        events.extend(month_events(2, TAUGHT_TO_3_1, 2025, 3, 5, 4));
        events.extend(month_events(1, TAUGHT_TO_3_1, 2025, 4, 5, 3));
        events.extend(month_events(2, TAUGHT_TO_3_1, 2025, 4, 5, 3));

        let result = aggregate_monthly(&events, &sections(), year_level_label);

        assert_eq!(result.year_levels, vec!["3rd Year"]);
        assert_eq!(result.months, vec!["Mar", "Apr"]);
        assert_eq!(result.series_for("3rd Year"), Some(&[80.0, 60.0][..]));
        assert_eq!(result.buckets.len(), 2);
        assert_eq!(result.buckets[0].total_records, 10);
        assert_eq!(result.buckets[0].present_count, 8);
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate_monthly(&[], &sections(), year_level_label);
        assert!(result.is_empty());
        assert!(result.year_levels.is_empty());
        assert!(result.series.is_empty());
    }

    #[test]
    fn test_sparse_months_and_zero_fill() {
        // January for 3rd year only, March for both; nothing in February.
        let events = vec![
            event(1, TAUGHT_TO_3_1, (2025, 1, 6), true),
            event(1, TAUGHT_TO_3_1, (2025, 3, 3), false),
            event(2, TAUGHT_TO_1_2, (2025, 3, 3), true),
        ];
        let result = aggregate_monthly(&events, &sections(), year_level_label);

        assert_eq!(result.months, vec!["Jan", "Mar"]);
        assert_eq!(result.year_levels, vec!["3rd Year", "1st Year"]);
        assert_eq!(result.series_for("3rd Year"), Some(&[100.0, 0.0][..]));
        assert_eq!(result.series_for("1st Year"), Some(&[0.0, 100.0][..]));
    }

    #[test]
    fn test_months_sorted_chronologically_across_years() {
        let events = vec![
            event(1, TAUGHT_TO_3_1, (2025, 2, 3), true),
            event(1, TAUGHT_TO_3_1, (2024, 11, 4), true),
            event(1, TAUGHT_TO_3_1, (2024, 8, 5), false),
        ];
        let result = aggregate_monthly(&events, &sections(), year_level_label);
        assert_eq!(result.months, vec!["Aug", "Nov", "Feb"]);
        assert_eq!(result.series_for("3rd Year"), Some(&[0.0, 100.0, 100.0][..]));
    }

    #[test]
    fn test_duplicate_month_positive_rates_are_averaged() {
        let mut events = month_events(1, TAUGHT_TO_3_1, 2024, 3, 4, 4); // 100%
        events.extend(month_events(1, TAUGHT_TO_3_1, 2024, 9, 2, 1)); // 50%
        events.extend(month_events(1, TAUGHT_TO_3_1, 2025, 3, 4, 1)); // 25%

        let result = aggregate_monthly(&events, &sections(), year_level_label);
        assert_eq!(result.months, vec!["Mar", "Sep"]);
        assert_eq!(result.series_for("3rd Year"), Some(&[62.5, 50.0][..]));
    }

    #[test]
    fn test_duplicate_month_zero_never_overrides() {
        // 1st year only attends in March 2024, 3rd year only in March 2025.
        let events = vec![
            event(1, TAUGHT_TO_1_2, (2024, 3, 4), true),
            event(2, TAUGHT_TO_3_1, (2025, 3, 3), true),
            event(2, TAUGHT_TO_3_1, (2025, 3, 4), false),
        ];
        let result = aggregate_monthly(&events, &sections(), year_level_label);
        assert_eq!(result.months, vec!["Mar"]);
        assert_eq!(result.series_for("1st Year"), Some(&[100.0][..]));
        assert_eq!(result.series_for("3rd Year"), Some(&[50.0][..]));
        // Raw buckets keep both years apart.
        assert_eq!(result.buckets.len(), 2);
        assert_eq!(result.buckets[0].year, 2024);
        assert_eq!(result.buckets[1].year, 2025);
    }

    #[test]
    fn test_unknown_assignment_falls_back_to_other_year() {
        let events = vec![event(1, 999, (2025, 3, 3), true)];
        let result = aggregate_monthly(&events, &sections(), year_level_label);
        assert_eq!(result.year_levels, vec!["Other Year"]);
    }

    #[test]
    fn test_year_levels_in_encounter_order_not_sorted() {
        let events = vec![
            event(2, TAUGHT_TO_1_2, (2025, 3, 4), true),
            event(1, TAUGHT_TO_3_1, (2025, 3, 3), true),
        ];
        let result = aggregate_monthly(&events, &sections(), year_level_label);
        assert_eq!(result.year_levels, vec!["3rd Year", "1st Year"]);
    }

    #[test]
    fn test_custom_labeller() {
        let events = vec![event(1, TAUGHT_TO_3_1, (2025, 3, 3), true)];
        let result = aggregate_monthly(&events, &sections(), |name: &str| format!("Section {name}"));
        assert_eq!(result.year_levels, vec!["Section 3-1"]);
    }

    #[test]
    fn test_month_names() {
        assert_eq!(month_name(3), "March");
        assert_eq!(month_abbreviation(9), "Sep");
        assert_eq!(month_name(13), "Unknown");
    }

    #[test]
    fn test_merge_duplicate_month() {
        assert_eq!(merge_duplicate_month(80.0, 0.0), 80.0);
        assert_eq!(merge_duplicate_month(0.0, 80.0), 80.0);
        assert_eq!(merge_duplicate_month(0.0, 0.0), 0.0);
        assert_eq!(merge_duplicate_month(80.0, 65.0), 72.5);
        assert_eq!(merge_duplicate_month(60.0, 75.0), 67.5);
    }

    fn rate_strategy() -> impl Strategy<Value = f64> {
        (1u32..=1000).prop_map(|tenths| f64::from(tenths) / 10.0)
    }

    fn event_strategy() -> impl Strategy<Value = AttendanceEvent> {
        (
            1i64..6,
            prop_oneof![Just(TAUGHT_TO_3_1), Just(TAUGHT_TO_1_2), Just(7i64)],
            2023i32..2026,
            1u32..=12,
            1u32..=28,
            any::<bool>(),
        )
            .prop_map(|(student, assigned, y, m, d, present)| {
                event(student, assigned, (y, m, d), present)
            })
    }

    proptest! {
        #[test]
        fn series_align_with_month_axis(events in prop::collection::vec(event_strategy(), 0..120)) {
            let result = aggregate_monthly(&events, &sections(), year_level_label);
            prop_assert_eq!(result.series.len(), result.year_levels.len());
            for level in &result.year_levels {
                let rates = result.series_for(level).unwrap();
                prop_assert_eq!(rates.len(), result.months.len());
                for rate in rates {
                    prop_assert!((0.0..=100.0).contains(rate));
                }
            }
            prop_assert!(result.months.len() <= 12);
        }

        #[test]
        fn aggregation_is_order_independent(events in prop::collection::vec(event_strategy(), 0..60)) {
            let forward = aggregate_monthly(&events, &sections(), year_level_label);
            let mut reversed = events.clone();
            reversed.reverse();
            let backward = aggregate_monthly(&reversed, &sections(), year_level_label);
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn zero_never_overrides_positive(a in rate_strategy()) {
            prop_assert_eq!(merge_duplicate_month(a, 0.0), a);
            prop_assert_eq!(merge_duplicate_month(0.0, a), a);
        }

        #[test]
        fn positive_duplicates_are_averaged(a in rate_strategy(), b in rate_strategy()) {
            prop_assert_eq!(merge_duplicate_month(a, b), round_one_decimal((a + b) / 2.0));
        }
    }
}
