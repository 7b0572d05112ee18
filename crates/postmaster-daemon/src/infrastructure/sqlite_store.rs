//! Read-only [`MessageStore`] over the Messages SQLite database.
//!
//! Only three statements are ever run against `chat.db`: an access check,
//! "latest SMS row", and "SMS rows newer than the watermark".  The database is
//! opened read-only; Messages.app owns it and keeps writing while we poll.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Params};
use tracing::debug;

use crate::application::{MessageStore, ScannedRows, StoreError};
use crate::domain::RawRow;

const PROBE_SQL: &str = "SELECT 1 FROM message LIMIT 1";

const LATEST_ROW_SQL: &str = "SELECT guid, attributedBody, date FROM message \
     WHERE service = 'SMS' ORDER BY date DESC LIMIT 1";

const ROWS_AFTER_SQL: &str = "SELECT guid, attributedBody, date FROM message \
     WHERE service = 'SMS' AND date > ?1 ORDER BY date ASC";

/// SQLite-backed message store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens the database at `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file does not exist or cannot be
    /// opened.  Callers treat this as fatal at startup.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "opened message store");
        Ok(Self { conn })
    }

    /// Wraps an existing connection (used by tests with in-memory databases).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn fetch<P: Params>(&self, sql: &str, params: P) -> Result<ScannedRows, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let rows = stmt
            .query_map(params, |row| {
                Ok(RawRow {
                    guid: row.get(0)?,
                    // attributedBody is NULL for some system messages.
                    attributed_body: row.get::<_, Option<Vec<u8>>>(1)?.unwrap_or_default(),
                    timestamp: row.get(2)?,
                })
            })
            .map_err(|e| StoreError::Query(e.to_string()))?
            .map(|result| result.map_err(|e| StoreError::Row(e.to_string())))
            .collect();

        Ok(rows)
    }
}

impl MessageStore for SqliteStore {
    fn check_access(&self) -> Result<(), StoreError> {
        self.conn
            .query_row(PROBE_SQL, [], |_| Ok(()))
            .optional()
            .map(|_| ())
            .map_err(|e| StoreError::Access(e.to_string()))
    }

    fn latest_row(&self) -> Result<ScannedRows, StoreError> {
        self.fetch(LATEST_ROW_SQL, [])
    }

    fn rows_after(&self, watermark: i64) -> Result<ScannedRows, StoreError> {
        self.fetch(ROWS_AFTER_SQL, params![watermark])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
