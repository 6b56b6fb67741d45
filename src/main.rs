//! rollcall - attendance statistics for programs and sections
//!
//! Reads the attendance store and prints rates, monthly trends per year
//! level and headline metrics.
//!
//! ## Usage
//!
//! ```bash
//! # Program report for the current term
//! rollcall program 1 --academic-year 2024-2025 --semester "2nd Semester"
//!
//! # Section report as JSON
//! rollcall --json section 12
//!
//! # Per-course breakdown for a section
//! rollcall courses 12
//!
//! # Different database, verbose logging
//! rollcall --db /srv/attendance.db -v program 1
//! ```

mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rollcall_config::RollcallConfig;
use rollcall_core::{init_logging, LogGuard, RollcallError};
use rollcall_stats::{AttendanceDatabase, ScopeAnchor, StatsError, StatsQuery, TermFilter};
use tracing::{error, info};

/// Exit code for arguments the engine rejects (clap uses the same code).
const EXIT_USAGE: u8 = 2;

/// Attendance statistics for programs and sections
#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.rollcall/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Attendance database, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.rollcall/logs/)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Statistics, monthly trend and key metrics for a program
    Program {
        /// Program id
        id: i64,

        #[command(flatten)]
        term: TermArgs,
    },

    /// Statistics, monthly trend and key metrics for a section
    Section {
        /// Section id
        id: i64,

        #[command(flatten)]
        term: TermArgs,
    },

    /// Per-course rates for a section
    Courses {
        /// Section id
        section_id: i64,

        #[command(flatten)]
        term: TermArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct TermArgs {
    /// Academic year, e.g. 2024-2025
    #[arg(long)]
    academic_year: Option<String>,

    /// Semester, e.g. "1st Semester"
    #[arg(long)]
    semester: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.guidance() {
                eprintln!("Hint: {}", hint);
            }
            return ExitCode::from(1);
        }
    };

    // Initialize logging
    let _guard = match setup_logging(&cli, &config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "rollcall failed");
            match e.downcast_ref::<StatsError>() {
                Some(stats) => {
                    eprintln!("{}", stats.friendly_message());
                    if matches!(stats, StatsError::MalformedInput { .. }) {
                        return ExitCode::from(EXIT_USAGE);
                    }
                }
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::from(1)
        }
    }
}

/// Load configuration from `--config`, or the default location if present.
fn load_config(cli: &Cli) -> rollcall_core::Result<RollcallConfig> {
    match &cli.config {
        Some(path) => RollcallConfig::from_yaml(path),
        None => RollcallConfig::load_or_default(&RollcallConfig::default_path()?),
    }
}

/// Set up logging from CLI arguments, falling back to the configuration.
fn setup_logging(cli: &Cli, config: &RollcallConfig) -> rollcall_core::Result<LogGuard> {
    let verbose = cli.verbose > 0 || config.logging.verbose;
    let log_dir = cli.log_dir.clone().or_else(|| config.logging.dir.clone());
    init_logging(log_dir, verbose)
}

fn run(cli: &Cli, config: &RollcallConfig) -> anyhow::Result<()> {
    let db_path = cli.db.as_ref().unwrap_or(&config.database.path);
    let timeout = Duration::from_millis(config.database.busy_timeout_ms);
    let db = AttendanceDatabase::open_existing(db_path, timeout)
        .with_context(|| format!("opening {}", db_path.display()))?;
    let query = StatsQuery::new(&db);

    info!(db = %db_path.display(), command = ?cli.command, "running query");

    match &cli.command {
        Command::Program { id, term } => {
            report(&query, ScopeAnchor::Program(*id), &term_filter(term, config)?, cli.json)
        }
        Command::Section { id, term } => {
            report(&query, ScopeAnchor::Section(*id), &term_filter(term, config)?, cli.json)
        }
        Command::Courses { section_id, term } => {
            let filter = term_filter(term, config)?;
            let lines = query.section_course_breakdown(*section_id, &filter)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else if lines.is_empty() {
                println!("{}", render::NO_DATA);
            } else {
                let text = render::BreakdownText {
                    section_id: *section_id,
                    filter: &filter,
                    lines: &lines,
                };
                print!("{text}");
            }
            Ok(())
        }
    }
}

fn report(
    query: &StatsQuery<'_>,
    anchor: ScopeAnchor,
    filter: &TermFilter,
    json: bool,
) -> anyhow::Result<()> {
    let today = chrono::Local::now().date_naive();
    let report = query.scope_report(anchor, filter, today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !report.has_data() {
        println!("{}", render::NO_DATA);
    } else {
        print!("{}", render::ReportText(&report));
    }
    Ok(())
}

/// Term filter from the command line, defaulting to the configured term.
fn term_filter(args: &TermArgs, config: &RollcallConfig) -> Result<TermFilter, StatsError> {
    let academic_year = args
        .academic_year
        .as_deref()
        .or(config.defaults.academic_year.as_deref());
    let semester = args.semester.as_deref().or(config.defaults.semester.as_deref());
    TermFilter::new(academic_year, semester)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rollcall",
            "program",
            "4",
            "--academic-year",
            "2024-2025",
            "--json",
            "-vv",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Program { id, term } => {
                assert_eq!(id, 4);
                assert_eq!(term.academic_year.as_deref(), Some("2024-2025"));
                assert_eq!(term.semester, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_a_command() {
        assert!(Cli::try_parse_from(["rollcall"]).is_err());
        assert!(Cli::try_parse_from(["rollcall", "courses"]).is_err());
    }

    #[test]
    fn test_term_filter_falls_back_to_config() {
        let mut config = RollcallConfig::default();
        config.defaults.academic_year = Some("2024-2025".to_string());
        config.defaults.semester = Some("1st Semester".to_string());

        let filter = term_filter(&TermArgs::default(), &config).unwrap();
        assert_eq!(filter.academic_year(), Some("2024-2025"));

        let args = TermArgs {
            academic_year: None,
            semester: Some("2nd Semester".to_string()),
        };
        let filter = term_filter(&args, &config).unwrap();
        assert_eq!(filter.semester(), Some("2nd Semester"));
    }

    #[test]
    fn test_malformed_term_is_rejected() {
        let args = TermArgs {
            academic_year: Some(" 2024-2025".to_string()),
            semester: None,
        };
        let err = term_filter(&args, &RollcallConfig::default()).unwrap_err();
        assert!(matches!(err, StatsError::MalformedInput { .. }));
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "rollcall",
            "--config",
            dir.path().join("missing.yaml").to_str().unwrap(),
            "section",
            "1",
        ])
        .unwrap();
        let err = load_config(&cli).unwrap_err();
        assert!(matches!(err, RollcallError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_missing_database_is_an_error_not_an_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("typo.db");
        let cli = Cli::try_parse_from([
            "rollcall",
            "--db",
            db_path.to_str().unwrap(),
            "section",
            "1",
        ])
        .unwrap();

        let err = run(&cli, &RollcallConfig::default()).unwrap_err();
        let stats = err.downcast_ref::<StatsError>().unwrap();
        assert!(stats.is_store_unavailable());
        assert!(!db_path.exists());
    }
}
