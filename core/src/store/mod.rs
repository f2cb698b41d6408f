//! SQLite persistence layer for the record relations.
//!
//! RULE: Only the store talks to the database.
//! The aggregator sees it through the `records` source traits and never
//! executes SQL directly.

use crate::{
    error::{SourceError, TriageError, TriageResult},
    records::SourceResult,
};
use rusqlite::{Connection, OpenFlags};
use std::sync::{Mutex, MutexGuard};

mod customer;
mod prior_case;
mod transaction;

/// One SQLite file holding any of the `customer`, `txn` and `prior_case`
/// tables. The connection sits behind a mutex so a single store can serve
/// concurrent lookups.
pub struct RecordStore {
    conn: Mutex<Connection>,
    path: Option<String>, // None for :memory:
}

impl RecordStore {
    /// Open (or create) a read-write database. Used by import and tests.
    pub fn open(path: &str) -> TriageResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        })
    }

    /// Open an existing database for lookups only. A missing or unreadable
    /// file is reported as an unavailable source.
    pub fn open_read_only(path: &str, source_name: &'static str) -> SourceResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| SourceError::Unavailable {
            source_name,
            reason: format!("cannot open {path}: {e}"),
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> TriageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply the schema. Idempotent.
    pub fn migrate(&self) -> TriageResult<()> {
        self.write(|conn| conn.execute_batch(include_str!("../../../migrations/001_records.sql")))
    }

    /// Row counts for `customer`, `txn` and `prior_case`.
    pub fn counts(&self) -> TriageResult<(usize, usize, usize)> {
        self.write(|conn| {
            let count = |table: &str| -> rusqlite::Result<usize> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
                    r.get::<_, i64>(0)
                })
                .map(|n| n as usize)
            };
            Ok((count("customer")?, count("txn")?, count("prior_case")?))
        })
    }

    /// Run `f` inside one transaction; bulk inserts go through here.
    fn in_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<T>,
    ) -> TriageResult<T> {
        let mut conn = self.lock().map_err(|e| TriageError::Other(anyhow::anyhow!(e)))?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, String> {
        self.conn
            .lock()
            .map_err(|_| "record store connection poisoned".to_string())
    }

    fn write<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> TriageResult<T> {
        let conn = self.lock().map_err(|e| TriageError::Other(anyhow::anyhow!(e)))?;
        Ok(f(&conn)?)
    }

    fn read<T>(
        &self,
        source_name: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> SourceResult<T> {
        let conn = self
            .lock()
            .map_err(|reason| SourceError::Unavailable { source_name, reason })?;
        f(&conn).map_err(|error| SourceError::Query { source_name, error })
    }
}

/// Comma-joined identifier list, as stored in list-valued columns.
pub(crate) fn join_ids(ids: &[String]) -> String {
    ids.join(",")
}

pub(crate) fn split_ids(column: &str) -> Vec<String> {
    column
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `?{first}, ?{first+1}, ...` for an IN clause of `n` values.
pub(crate) fn placeholders(first: usize, n: usize) -> String {
    (first..first + n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_round_trip_through_columns() {
        let ids = vec!["ACC212".to_string(), "ACC223".to_string()];
        assert_eq!(split_ids(&join_ids(&ids)), ids);
        assert!(split_ids("").is_empty());
        assert_eq!(split_ids(" A , ,B "), vec!["A", "B"]);
    }

    #[test]
    fn placeholders_are_numbered_from_offset() {
        assert_eq!(placeholders(2, 3), "?2, ?3, ?4");
        assert_eq!(placeholders(1, 0), "");
    }
}
