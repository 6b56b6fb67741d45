//! # rollcall-stats
//!
//! Attendance statistics for programs and sections.
//!
//! This crate provides:
//! - [`AttendanceDatabase`] - SQLite store for programs, sections, courses,
//!   students, course assignments and attendance records
//! - [`resolve_scope`] - Which students and course assignments a report covers
//! - [`read_events`] - Attendance events for a resolved scope
//! - [`compute_rate`], [`aggregate_monthly`], [`summarize`] - The calculations
//! - [`StatsQuery`] - Query functions that tie the above together
//!
//! ## Example
//!
//! ```no_run
//! use rollcall_stats::{AttendanceDatabase, ScopeAnchor, StatsQuery, TermFilter};
//!
//! fn main() -> anyhow::Result<()> {
//!     let db = AttendanceDatabase::open("attendance.db")?;
//!     let query = StatsQuery::new(&db);
//!
//!     let filter = TermFilter::new(Some("2024-2025"), Some("2nd Semester"))?;
//!     let today = chrono::Local::now().date_naive();
//!     let report = query.scope_report(ScopeAnchor::Program(1), &filter, today)?;
//!
//!     println!("{} ({})", report.statistics.display_rate(), report.key_metrics.best_month);
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod events;
pub mod filter;
pub mod metrics;
pub mod models;
pub mod monthly;
pub mod query;
pub mod rate;
pub mod scope;
pub mod year_level;

// Re-export main types
pub use db::{AttendanceDatabase, SoftDeletable};
pub use error::{Result, StatsError};
pub use events::read_events;
pub use filter::SqlFilter;
pub use metrics::{summarize, summarize_now};
pub use models::{
    AttendanceEvent, AttendanceStatus, CourseAssignment, CourseBreakdown, CourseRates,
    KeyMetrics, MonthlyRate, MonthlySeries, RateSummary, YearLevelRate, NOT_AVAILABLE,
};
pub use monthly::aggregate_monthly;
pub use query::{ScopeReport, StatsQuery};
pub use rate::{compute_course_rates, compute_rate};
pub use scope::{resolve_scope, ResolvedScope, ScopeAnchor, TermFilter};
pub use year_level::{year_level_label, OTHER_YEAR};
