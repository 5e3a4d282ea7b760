//! History service - durable record of upgrade steps
//!
//! Every applied, failed or stamped step is written to the
//! `sys_upgrade_history` table next to the version record. Recording is
//! best effort: a failure to write history never fails an upgrade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use duckdb::params;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::domain::SchemaVersion;

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    let timestamp = now_ms() as u64;

    // Lower 16 bits for the counter (65536 unique IDs per millisecond)
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

/// Get current unix timestamp in milliseconds
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// What happened to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEventKind {
    Applied,
    Failed,
    Stamped,
}

impl HistoryEventKind {
    fn as_str(&self) -> &'static str {
        match self {
            HistoryEventKind::Applied => "applied",
            HistoryEventKind::Failed => "failed",
            HistoryEventKind::Stamped => "stamped",
        }
    }
}

/// A history event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub kind: HistoryEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_version: Option<SchemaVersion>,
    pub to_version: SchemaVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl HistoryEvent {
    fn new(kind: HistoryEventKind, to_version: SchemaVersion) -> Self {
        Self {
            kind,
            from_version: None,
            to_version,
            duration_ms: None,
            error_message: None,
        }
    }

    /// A step that ran and advanced the version
    pub fn applied(from: &SchemaVersion, to: &SchemaVersion) -> Self {
        Self::new(HistoryEventKind::Applied, to.clone()).with_from(from)
    }

    /// A step whose action or version write failed
    pub fn failed(from: &SchemaVersion, to: &SchemaVersion) -> Self {
        Self::new(HistoryEventKind::Failed, to.clone()).with_from(from)
    }

    /// A version set by hand
    pub fn stamped(to: &SchemaVersion) -> Self {
        Self::new(HistoryEventKind::Stamped, to.clone())
    }

    pub fn with_from(mut self, from: &SchemaVersion) -> Self {
        self.from_version = Some(from.clone());
        self
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// A history entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub timestamp: i64,
    pub event: String,
    pub from_version: Option<String>,
    pub to_version: Option<String>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
}

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp, event, from_version, to_version, duration_ms, error_message
     FROM sys_upgrade_history";

fn row_to_entry(row: &duckdb::Row) -> duckdb::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        event: row.get(2)?,
        from_version: row.get(3)?,
        to_version: row.get(4)?,
        duration_ms: row.get(5)?,
        error_message: row.get(6)?,
    })
}

/// Service for the upgrade history
pub struct HistoryService {
    repository: Arc<DuckDbRepository>,
}

impl HistoryService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Record an event
    pub fn record(&self, event: &HistoryEvent) -> Result<()> {
        self.repository.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO sys_upgrade_history (
                    id, timestamp, event, from_version, to_version, duration_ms, error_message
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    generate_id(),
                    now_ms(),
                    event.kind.as_str(),
                    event.from_version.as_ref().map(SchemaVersion::as_str),
                    event.to_version.as_str(),
                    event.duration_ms,
                    &event.error_message,
                ],
            )?;
            Ok(())
        })
    }

    /// Record an event, logging instead of failing (history should never break an upgrade)
    pub fn record_best_effort(&self, event: &HistoryEvent) {
        if let Err(e) = self.record(event) {
            warn!("failed to record upgrade history for {}: {}", event.to_version, e);
        }
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.query(&format!("{} ORDER BY id DESC LIMIT ?", SELECT_COLUMNS), limit)
    }

    /// Most recent failed steps, newest first
    pub fn get_failures(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.query(
            &format!("{} WHERE event = 'failed' ORDER BY id DESC LIMIT ?", SELECT_COLUMNS),
            limit,
        )
    }

    fn query(&self, sql: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.repository.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let entries = stmt
                .query_map([limit as i64], row_to_entry)?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    /// Get the total number of history entries
    pub fn count(&self) -> Result<u64> {
        self.repository.with_connection(|conn| {
            let count: u64 =
                conn.query_row("SELECT COUNT(*) FROM sys_upgrade_history", [], |row| row.get(0))?;
            Ok(count)
        })
    }

    /// Delete entries older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        self.repository.with_connection(|conn| {
            let deleted = conn.execute(
                "DELETE FROM sys_upgrade_history WHERE timestamp < ?",
                [timestamp_ms],
            )?;
            Ok(deleted as u64)
        })
    }
}
