//! Logging infrastructure for rollcall.
//!
//! Structured logging on top of the `tracing` ecosystem. The statistics
//! engine only emits events through `tracing` macros; installing a
//! subscriber is the job of the binary that embeds it.
//!
//! ## Features
//!
//! - JSON lines written to `~/.rollcall/logs/rollcall.log` (rolled daily)
//! - Compact human-readable output on stderr
//! - `RUST_LOG` overrides the default filter
//!
//! ## Example
//!
//! ```no_run
//! use rollcall_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//! tracing::info!(program_id = 3, "building program report");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{Result, RollcallError};

/// File name used for the rolling log file.
const LOG_FILE_NAME: &str = "rollcall.log";

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Dropping it flushes pending log entries, so keep it alive for the
/// lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the rollcall logging system.
///
/// Sets up a JSON file layer in `log_dir` (defaults to
/// [`default_log_dir`]) and a compact stderr layer. `verbose` lowers the
/// default level from INFO to DEBUG; `RUST_LOG` takes precedence over both.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| RollcallError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rollcall={default_level}")));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| RollcallError::internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Base directory for rollcall state: `~/.rollcall/`.
pub fn rollcall_home() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RollcallError::internal("home directory could not be determined"))?;
    Ok(home.join(".rollcall"))
}

/// Get the default log directory path (`~/.rollcall/logs/`).
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(rollcall_home()?.join("logs"))
}

/// Get the default log file path (`~/.rollcall/logs/rollcall.log`).
pub fn default_log_file() -> Result<PathBuf> {
    Ok(default_log_dir()?.join(LOG_FILE_NAME))
}
