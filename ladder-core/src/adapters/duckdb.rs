//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use duckdb::{params, Connection, OptionalExt};
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::SchemaVersion;
use crate::ports::{ScriptExecutor, VersionStore};
use crate::schema::SYSTEM_TABLES;

/// Preference key holding the recorded schema version
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB repository implementation
///
/// Holds the single connection used for the version record, the upgrade
/// history and the migration scripts themselves.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) a database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when another process still holds the file.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            "database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Disable extension autoloading; scripts only get the statically linked features
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)?;
        Ok(conn)
    }

    /// Create the system tables if they do not exist yet
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        for (name, sql) in SYSTEM_TABLES {
            debug!("applying system table definition {}", name);
            conn.execute_batch(sql)?;
        }
        Ok(())
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` succeeds. On error (or panic) the transaction guard is
    /// dropped and DuckDB rolls the changes back.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<Error>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(Error::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(Error::from)?;
        Ok(value)
    }

    /// Check if a table exists in the main schema
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                [table_name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    // === Preferences ===

    pub fn get_preference(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM sys_preferences WHERE key = ?",
                    [key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO sys_preferences (key, value, updated_at)
                 VALUES (?, ?, current_timestamp)
                 ON CONFLICT (key) DO UPDATE
                 SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value],
            )?;
            Ok(())
        })
    }

    /// The recorded schema version, if any
    pub fn read_version(&self) -> Result<Option<SchemaVersion>> {
        Ok(self
            .get_preference(SCHEMA_VERSION_KEY)?
            .map(SchemaVersion::from))
    }
}

impl VersionStore for DuckDbRepository {
    fn get_current_version(&self) -> Result<SchemaVersion> {
        self.read_version()?
            .ok_or_else(|| Error::not_found("no schema version has been recorded"))
    }

    fn set_current_version(&self, version: &SchemaVersion) -> Result<()> {
        self.set_preference(SCHEMA_VERSION_KEY, version.as_str())
    }
}

impl ScriptExecutor for DuckDbRepository {
    /// Execute a batch of SQL statements, optionally inside one transaction
    fn execute_script(&self, sql: &str, transactional: bool) -> Result<()> {
        if transactional {
            self.transaction(|conn| conn.execute_batch(sql).map_err(Error::from))
        } else {
            self.with_connection(|conn| conn.execute_batch(sql).map_err(Error::from))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn memory_repo() -> DuckDbRepository {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error("IO Error: Could not set lock on file: Database is locked"));
        assert!(is_retryable_error(
            "The process cannot access the file because it is being used by another process"
        ));
        assert!(!is_retryable_error("Parser Error: syntax error at or near \"SELEC\""));
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let repo = memory_repo();
        repo.ensure_schema().unwrap();
        assert!(repo.table_exists("sys_preferences").unwrap());
        assert!(repo.table_exists("sys_upgrade_history").unwrap());
    }

    #[test]
    fn test_version_missing_on_fresh_db() {
        let repo = memory_repo();
        assert!(repo.read_version().unwrap().is_none());
        assert!(matches!(
            repo.get_current_version(),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_set_version_overwrites_previous_value() {
        let repo = memory_repo();
        repo.set_current_version(&SchemaVersion::new("2.5.9")).unwrap();
        repo.set_current_version(&SchemaVersion::new("2.5.10")).unwrap();
        assert_eq!(repo.get_current_version().unwrap().as_str(), "2.5.10");
    }

    #[test]
    fn test_version_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.duckdb");

        {
            let repo = DuckDbRepository::new(&db_path).unwrap();
            repo.ensure_schema().unwrap();
            repo.set_current_version(&SchemaVersion::new("2.5.3")).unwrap();
        }

        let repo = DuckDbRepository::new(&db_path).unwrap();
        assert_eq!(repo.db_path(), Some(db_path.as_path()));
        assert_eq!(repo.get_current_version().unwrap().as_str(), "2.5.3");
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let repo = memory_repo();
        repo.execute_script("CREATE TABLE items (id INTEGER);", false).unwrap();

        let result = repo.execute_script(
            "INSERT INTO items VALUES (1); INSERT INTO missing_table VALUES (2);",
            true,
        );
        assert!(result.is_err());

        let count: i64 = repo
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_transaction_commits_on_success() {
        let repo = memory_repo();
        repo.execute_script(
            "CREATE TABLE items (id INTEGER); INSERT INTO items VALUES (1), (2);",
            true,
        )
        .unwrap();

        let count: i64 = repo
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 2);
    }
}
