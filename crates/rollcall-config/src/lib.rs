//! # rollcall-config
//!
//! YAML configuration for the rollcall tools.
//!
//! ```yaml
//! database:
//!   path: /var/lib/attendance/attendance.db
//!   busy_timeout_ms: 5000
//! logging:
//!   dir: /var/log/rollcall
//!   verbose: false
//! defaults:
//!   academic_year: "2024-2025"
//!   semester: "1st Semester"
//! ```
//!
//! Every section is optional; missing values fall back to [`Default`].

use std::path::{Path, PathBuf};

use rollcall_core::{logging::rollcall_home, Result, RollcallError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Upper bound accepted for `database.busy_timeout_ms`.
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    /// Attendance store settings
    pub database: DatabaseConfig,

    /// Log output settings
    pub logging: LoggingConfig,

    /// Term used when the command line does not name one
    pub defaults: TermDefaults,
}

/// Attendance store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite attendance database
    pub path: PathBuf,

    /// How long SQLite waits on a locked database before reporting busy
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let base = rollcall_home().unwrap_or_else(|_| PathBuf::from(".rollcall"));
        Self {
            path: base.join("attendance.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for log files (defaults to ~/.rollcall/logs/)
    pub dir: Option<PathBuf>,

    /// Log at DEBUG instead of INFO
    pub verbose: bool,
}

/// Default academic term filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermDefaults {
    /// Academic year, e.g. "2024-2025"
    pub academic_year: Option<String>,

    /// Semester, e.g. "1st Semester"
    pub semester: Option<String>,
}

impl RollcallConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RollcallError::config_not_found_with_source(path, e)
            } else {
                RollcallError::io("reading config", path, e)
            }
        })?;
        let config = Self::from_yaml_str(&content).map_err(|e| match e {
            RollcallError::ConfigInvalid { message, .. } => RollcallError::ConfigInvalid {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty file parses as YAML null.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| RollcallError::ConfigInvalid {
                path: PathBuf::new(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }
        Self::from_yaml(path)
    }

    /// Default configuration path (`~/.rollcall/config.yaml`).
    pub fn default_path() -> Result<PathBuf> {
        Ok(rollcall_home()?.join("config.yaml"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(RollcallError::config_validation(
                "database.path must not be empty",
            ));
        }
        if self.database.busy_timeout_ms == 0 || self.database.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS
        {
            return Err(RollcallError::config_validation(format!(
                "database.busy_timeout_ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        for (field, value) in [
            ("defaults.academic_year", &self.defaults.academic_year),
            ("defaults.semester", &self.defaults.semester),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(RollcallError::config_validation(format!(
                    "{field} must not be blank"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RollcallConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.database.path.ends_with("attendance.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
defaults:
  academic_year: "2024-2025"
  semester: "1st Semester"
"#;
        let config = RollcallConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.defaults.academic_year.as_deref(), Some("2024-2025"));
        assert_eq!(config.defaults.semester.as_deref(), Some("1st Semester"));
        assert_eq!(config.database, DatabaseConfig::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(
            RollcallConfig::from_yaml_str("  \n").unwrap(),
            RollcallConfig::default()
        );
    }

    #[test]
    fn test_rejects_zero_busy_timeout() {
        let yaml = "database:\n  path: /tmp/a.db\n  busy_timeout_ms: 0\n";
        let err = RollcallConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, RollcallError::ConfigValidation { .. }));
    }

    #[test]
    fn test_rejects_blank_semester() {
        let yaml = "defaults:\n  semester: \"  \"\n";
        let err = RollcallConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("defaults.semester"));
    }

    #[test]
    fn test_invalid_yaml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"database: [unclosed").unwrap();
        let err = RollcallConfig::from_yaml(file.path()).unwrap_err();
        match err {
            RollcallError::ConfigInvalid { path, .. } => assert_eq!(path, file.path()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = RollcallConfig::load_or_default(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, RollcallConfig::default());
    }

    #[test]
    fn test_from_yaml_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RollcallConfig::from_yaml(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, RollcallError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database:\n  path: /srv/attendance.db\n  busy_timeout_ms: 250\nlogging:\n  verbose: true"
        )
        .unwrap();
        let config = RollcallConfig::from_yaml(file.path()).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/srv/attendance.db"));
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert!(config.logging.verbose);
        assert!(config.logging.dir.is_none());
    }
}
