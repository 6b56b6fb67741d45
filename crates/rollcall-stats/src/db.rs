//! SQLite attendance store.
//!
//! The statistics engine only reads from this store. The write helpers exist
//! for the data-entry side of the application (and for tests); every
//! dimension table carries an `is_deleted` flag that readers must honor.

use crate::error::{is_database_locked_error, Result, StatsError};
use crate::models::{AttendanceEvent, CourseAssignment};
use rusqlite::{params, Connection, OpenFlags, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Current schema version for migrations.
const SCHEMA_VERSION: i32 = 2;

/// Maximum retries for database lock errors.
const DB_LOCK_MAX_RETRIES: u32 = 5;

/// Initial delay for database lock retry (in milliseconds).
const DB_LOCK_INITIAL_DELAY_MS: u64 = 50;

/// Maximum delay for database lock retry.
const DB_LOCK_MAX_DELAY: Duration = Duration::from_secs(5);

/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tables that support soft deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDeletable {
    Program,
    Section,
    Course,
    CourseAssignment,
    Student,
}

impl SoftDeletable {
    fn table(self) -> &'static str {
        match self {
            Self::Program => "programs",
            Self::Section => "sections",
            Self::Course => "courses",
            Self::CourseAssignment => "course_assignments",
            Self::Student => "users",
        }
    }
}

/// SQLite database holding programs, sections, courses, students, course
/// assignments and attendance records.
pub struct AttendanceDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl AttendanceDatabase {
    /// Open or create an attendance database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open with a custom SQLite busy timeout.
    pub fn open_with_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        debug!(path = %path.as_ref().display(), "opened attendance database");
        Self::from_connection(conn)
    }

    /// Open an existing database for reading only.
    ///
    /// Unlike [`open`](Self::open) this never creates the file and runs no
    /// migrations, so a missing or mistyped path fails here instead of
    /// turning into an empty store.
    pub fn open_existing<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        debug!(path = %path.as_ref().display(), "opened attendance database read-only");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Lock the connection for the duration of the returned guard.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StatsError::Query(format!("failed to acquire lock: {}", e)))
    }

    /// Get raw database connection for advanced queries.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Execute a database operation with automatic retry on lock errors.
    fn with_retry<T, F>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        let mut delay = Duration::from_millis(DB_LOCK_INITIAL_DELAY_MS);

        loop {
            attempt += 1;

            match f() {
                Ok(result) => {
                    if attempt > 1 {
                        info!(attempt, operation, "Database operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(ref e) if is_database_locked_error(e) && attempt <= DB_LOCK_MAX_RETRIES => {
                    warn!(
                        attempt,
                        max_retries = DB_LOCK_MAX_RETRIES,
                        delay_ms = delay.as_millis(),
                        operation,
                        "Database locked, retrying with backoff"
                    );

                    std::thread::sleep(delay);
                    delay = std::cmp::min(delay * 2, DB_LOCK_MAX_DELAY);
                }
                Err(e) => {
                    if attempt > 1 {
                        warn!(attempt, operation, error = %e, "Database operation failed after retries");
                    }
                    if is_database_locked_error(&e) {
                        return Err(StatsError::DatabaseLocked {
                            retry_count: attempt - 1,
                            max_retries: DB_LOCK_MAX_RETRIES,
                            message: e.to_string(),
                        });
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Run `f` inside a deferred read transaction.
    ///
    /// The connection lock and the transaction are both scoped to one
    /// attempt, so they are released on success, on error, and before every
    /// retry. Nothing is written; the transaction is rolled back on drop.
    pub fn with_read_transaction<T, F>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut(&Connection) -> Result<T>,
    {
        self.with_retry(operation, || {
            let mut conn = self.lock()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            f(&tx)
        })
    }

    /// Run database migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StatsError::Migration(format!("failed to acquire lock: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

        if current_version < SCHEMA_VERSION {
            info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );
            Self::run_migrations(&conn, current_version)?;
        }

        Ok(())
    }

    /// Run migrations from current version to target.
    fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
        if from_version < 1 {
            Self::migration_v1(conn)?;
        }
        if from_version < 2 {
            Self::migration_v2(conn)?;
        }
        Ok(())
    }

    /// Migration to version 1: dimension tables and attendance log.
    fn migration_v1(conn: &Connection) -> Result<()> {
        debug!("Running migration v1: initial schema");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS programs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL,
                name TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                program_id INTEGER NOT NULL REFERENCES programs(id),
                name TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                program_id INTEGER NOT NULL REFERENCES programs(id),
                code TEXT NOT NULL,
                name TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'student',
                section_id INTEGER REFERENCES sections(id),
                is_active INTEGER NOT NULL DEFAULT 1,
                is_deleted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS course_assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL REFERENCES courses(id),
                section_id INTEGER NOT NULL REFERENCES sections(id),
                academic_year TEXT NOT NULL,
                semester TEXT NOT NULL,
                instructor_id INTEGER REFERENCES users(id),
                room TEXT,
                is_deleted INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                assigned_course_id INTEGER NOT NULL REFERENCES course_assignments(id),
                date TEXT NOT NULL,
                status TEXT NOT NULL,
                UNIQUE (user_id, assigned_course_id, date)
            );

            INSERT INTO schema_version (version) VALUES (1);",
        )?;

        info!("Migration v1 completed");
        Ok(())
    }

    /// Migration to version 2: indexes for scope resolution and event reads.
    fn migration_v2(conn: &Connection) -> Result<()> {
        debug!("Running migration v2: scoping indexes");

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_sections_program ON sections(program_id);
             CREATE INDEX IF NOT EXISTS idx_users_section ON users(section_id);
             CREATE INDEX IF NOT EXISTS idx_assignments_section
                 ON course_assignments(section_id, academic_year, semester);
             CREATE INDEX IF NOT EXISTS idx_attendance_assignment
                 ON attendance(assigned_course_id);
             CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date);

             INSERT INTO schema_version (version) VALUES (2);",
        )?;

        info!("Migration v2 completed: scoping indexes");
        Ok(())
    }

    // ============ Write helpers ============

    /// Insert a program and return its id.
    pub fn insert_program(&self, code: &str, name: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO programs (code, name) VALUES (?1, ?2)",
            params![code, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a section under a program and return its id.
    pub fn insert_section(&self, program_id: i64, name: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sections (program_id, name) VALUES (?1, ?2)",
            params![program_id, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a course under a program and return its id.
    pub fn insert_course(&self, program_id: i64, code: &str, name: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO courses (program_id, code, name) VALUES (?1, ?2, ?3)",
            params![program_id, code, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert an active student enrolled in `section_id` and return its id.
    pub fn insert_student(&self, full_name: &str, section_id: Option<i64>) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (full_name, role, section_id) VALUES (?1, 'student', ?2)",
            params![full_name, section_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a course assignment and return its id. `assignment.id` is ignored.
    pub fn insert_course_assignment(&self, assignment: &CourseAssignment) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO course_assignments
             (course_id, section_id, academic_year, semester, instructor_id, room)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                assignment.course_id,
                assignment.section_id,
                assignment.academic_year,
                assignment.semester,
                assignment.instructor_id,
                assignment.room,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record a batch of attendance events in one transaction.
    ///
    /// A second event for the same (student, assigned course, date) violates
    /// the store's uniqueness constraint and rolls back the whole batch.
    pub fn record_attendance(&self, events: &[AttendanceEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO attendance (user_id, assigned_course_id, date, status)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for event in events {
                stmt.execute(params![
                    event.student_id,
                    event.assigned_course_id,
                    event.date.format("%Y-%m-%d").to_string(),
                    event.status.as_str(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(count = events.len(), "Recorded attendance events");
        Ok(events.len())
    }

    /// Set the soft-delete flag on a row. Returns false if no row matched.
    pub fn soft_delete(&self, kind: SoftDeletable, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let sql = format!("UPDATE {} SET is_deleted = 1 WHERE id = ?1", kind.table());
        let changed = conn.execute(&sql, params![id])?;
        debug!(table = kind.table(), id, changed, "Soft-deleted row");
        Ok(changed > 0)
    }

    /// Mark a student inactive without deleting them.
    pub fn deactivate_student(&self, student_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE users SET is_active = 0 WHERE id = ?1",
            params![student_id],
        )?;
        Ok(changed > 0)
    }
}
