//! `SQLite`-backed implementation of [`OffsetBackend`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. Partitions and
//! offsets are stored as JSON text so a recovered offset comes back exactly
//! as it was written, including any type the task did not expect.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use streamtap_types::offset::{SourceOffset, SourcePartition};
use streamtap_types::state::{StoredOffset, TaskId};

use crate::backend::OffsetBackend;
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for state tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS source_offsets (
    task TEXT NOT NULL,
    partition_json TEXT NOT NULL,
    offset_json TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (task, partition_json)
);
";

/// `SQLite`-backed offset storage.
///
/// Create with [`SqliteOffsetBackend::open`] for file-backed persistence
/// or [`SqliteOffsetBackend::in_memory`] for tests.
pub struct SqliteOffsetBackend {
    conn: Mutex<Connection>,
}

impl SqliteOffsetBackend {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` backend (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    fn now_sqlite() -> String {
        Utc::now().format(SQLITE_DATETIME_FMT).to_string()
    }

    /// Convert a `SQLite` datetime string to ISO-8601.
    fn sqlite_to_iso8601(raw: &str) -> String {
        NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT).map_or_else(
            |_| raw.to_string(),
            |ndt| format!("{}Z", ndt.format("%Y-%m-%dT%H:%M:%S")),
        )
    }

    fn decode_row(
        partition_json: &str,
        offset_json: &str,
        updated_at: &str,
    ) -> error::Result<StoredOffset> {
        Ok(StoredOffset {
            partition: serde_json::from_str(partition_json)?,
            offset: serde_json::from_str(offset_json)?,
            updated_at: Self::sqlite_to_iso8601(updated_at),
        })
    }
}

impl OffsetBackend for SqliteOffsetBackend {
    fn get_offset(
        &self,
        task: &TaskId,
        partition: &SourcePartition,
    ) -> error::Result<Option<StoredOffset>> {
        let partition_json = serde_json::to_string(partition)?;
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT offset_json, updated_at FROM source_offsets \
                 WHERE task = ?1 AND partition_json = ?2",
                rusqlite::params![task.as_str(), partition_json],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(offset_json, updated_at)| {
            Self::decode_row(&partition_json, &offset_json, &updated_at)
        })
        .transpose()
    }

    fn set_offset(
        &self,
        task: &TaskId,
        partition: &SourcePartition,
        offset: &SourceOffset,
    ) -> error::Result<()> {
        let partition_json = serde_json::to_string(partition)?;
        let offset_json = serde_json::to_string(offset)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO source_offsets (task, partition_json, offset_json, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(task, partition_json) \
             DO UPDATE SET offset_json = ?3, updated_at = ?4",
            rusqlite::params![
                task.as_str(),
                partition_json,
                offset_json,
                Self::now_sqlite()
            ],
        )?;
        Ok(())
    }

    fn list_offsets(&self, task: &TaskId) -> error::Result<Vec<StoredOffset>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT partition_json, offset_json, updated_at FROM source_offsets \
             WHERE task = ?1 ORDER BY partition_json",
        )?;
        let rows = stmt.query_map([task.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut offsets = Vec::new();
        for row in rows {
            let (partition_json, offset_json, updated_at) = row?;
            offsets.push(Self::decode_row(&partition_json, &offset_json, &updated_at)?);
        }
        Ok(offsets)
    }
}
