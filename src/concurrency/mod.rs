//! Concurrency Guard
//! Mission: No catalog write reaches storage without a version check or an exclusive lock
//!
//! Two protocols, chosen per endpoint through [`Mutation`]:
//! - Optimistic: conditional write on `version`, stale writers get `Conflict`.
//! - Pessimistic: exclusive lock taken as part of the read, held until commit.

pub mod guard;

pub use guard::{ConcurrencyGuard, Locked};

use rusqlite::Connection;
use thiserror::Error;

/// How a guarded endpoint mutates its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Commit only if the stored version still equals the one the caller read.
    Optimistic { expected_version: i64 },
    /// Read-modify-write under an exclusive lock.
    Pessimistic,
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("{table} {id} not found")]
    NotFound { table: &'static str, id: i64 },
    #[error("{table} {id}: expected version {expected}, found {actual}")]
    Conflict {
        table: &'static str,
        id: i64,
        expected: i64,
        actual: i64,
    },
    #[error("timed out waiting for lock on {table} {id}")]
    LockTimeout { table: &'static str, id: i64 },
    /// The mutation closure refused the change.
    #[error("{0}")]
    Rejected(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl GuardError {
    /// Translate a storage failure, recognising an exhausted busy wait.
    pub(crate) fn from_storage(table: &'static str, id: i64, err: rusqlite::Error) -> Self {
        if crate::db::is_lock_timeout(&err) {
            GuardError::LockTimeout { table, id }
        } else {
            GuardError::Storage(err)
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, GuardError::Storage(e) if crate::db::is_unique_violation(e))
    }
}

/// A row the guard can load by id.
pub trait Record: Sized {
    const TABLE: &'static str;

    fn id(&self) -> i64;
    fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Self>>;
}

/// Records carrying an integer `version` column.
pub trait Versioned: Record {
    fn version(&self) -> i64;

    /// `UPDATE .. SET .., version = version + 1 WHERE id = ? AND version = ?`.
    /// Returns the number of rows written.
    fn write_if_version(&self, conn: &Connection, expected: i64) -> rusqlite::Result<usize>;
}

/// Records written through an exclusive lock.
pub trait Lockable: Record {
    /// Persist every mutable field. Called inside the lock holder's transaction.
    fn write(&self, conn: &Connection) -> rusqlite::Result<()>;
    fn remove(conn: &Connection, id: i64) -> rusqlite::Result<()>;
}
