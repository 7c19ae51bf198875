//! Guard implementation over SQLite.
//!
//! SQLite has no row locks; `BEGIN IMMEDIATE` takes the database write lock,
//! which serialises lock holders at least as strictly as `SELECT .. FOR UPDATE`.
//! WAL keeps plain readers from waiting on the holder. The wait for the lock is
//! bounded by the connection busy timeout and ends in `LockTimeout`.

use super::{GuardError, Lockable, Mutation, Versioned};
use crate::db;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ConcurrencyGuard {
    db_path: PathBuf,
    lock_wait: Duration,
}

/// A record read under an exclusive lock.
///
/// The lock is released when this value is committed or dropped; dropping
/// without committing rolls back.
pub struct Locked<'c, T: Lockable> {
    tx: Transaction<'c>,
    record: T,
}

impl<'c, T: Lockable> Locked<'c, T> {
    pub fn record(&self) -> &T {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut T {
        &mut self.record
    }

    /// Write the (possibly modified) record and release the lock.
    /// Returns the stored state as re-read inside the transaction.
    pub fn commit(self) -> Result<T, GuardError> {
        let id = self.record.id();
        let fail = |e| GuardError::from_storage(T::TABLE, id, e);

        self.record.write(&self.tx).map_err(fail)?;
        let stored = T::find(&self.tx, id)
            .map_err(fail)?
            .ok_or(GuardError::NotFound { table: T::TABLE, id })?;
        self.tx.commit().map_err(fail)?;
        Ok(stored)
    }

    /// Delete the record and release the lock.
    pub fn delete(self) -> Result<T, GuardError> {
        let id = self.record.id();
        let fail = |e| GuardError::from_storage(T::TABLE, id, e);

        T::remove(&self.tx, id).map_err(fail)?;
        self.tx.commit().map_err(fail)?;
        Ok(self.record)
    }

    /// Release the lock without writing.
    pub fn release(self) {
        drop(self);
    }
}

impl ConcurrencyGuard {
    pub fn new(db_path: impl AsRef<Path>, lock_wait: Duration) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            lock_wait,
        }
    }

    pub fn lock_wait(&self) -> Duration {
        self.lock_wait
    }

    /// Connection for the caller to own while it holds a [`Locked`] record.
    pub fn connect(&self) -> Result<Connection, GuardError> {
        Ok(db::open(&self.db_path, self.lock_wait)?)
    }

    /// Read a record and take the exclusive lock in the same step.
    ///
    /// Blocks while another holder has the lock, up to the configured wait.
    pub fn find_for_update<'c, T: Lockable>(
        &self,
        conn: &'c mut Connection,
        id: i64,
    ) -> Result<Locked<'c, T>, GuardError> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| {
                let err = GuardError::from_storage(T::TABLE, id, e);
                if matches!(err, GuardError::LockTimeout { .. }) {
                    warn!(
                        table = T::TABLE,
                        id,
                        wait_ms = self.lock_wait.as_millis() as u64,
                        "⏳ Lock wait exhausted"
                    );
                }
                err
            })?;

        let record = T::find(&tx, id)
            .map_err(|e| GuardError::from_storage(T::TABLE, id, e))?
            .ok_or(GuardError::NotFound { table: T::TABLE, id })?;

        debug!(table = T::TABLE, id, "🔒 Exclusive lock acquired");
        Ok(Locked { tx, record })
    }

    /// Pessimistic read-modify-write. `mutate` runs while the lock is held; an
    /// `Err` from it rolls back.
    pub fn update_exclusive<T, F>(&self, id: i64, mutate: F) -> Result<T, GuardError>
    where
        T: Lockable,
        F: FnOnce(&mut T) -> Result<(), GuardError>,
    {
        let mut conn = self.connect()?;
        let mut locked = self.find_for_update::<T>(&mut conn, id)?;
        mutate(locked.record_mut())?;
        locked.commit()
    }

    pub fn delete_exclusive<T: Lockable>(&self, id: i64) -> Result<T, GuardError> {
        let mut conn = self.connect()?;
        let locked = self.find_for_update::<T>(&mut conn, id)?;
        locked.delete()
    }

    /// Optimistic commit: succeeds only if the stored version still equals
    /// `expected_version`, and increments it.
    pub fn commit_versioned<T: Versioned>(
        &self,
        record: &T,
        expected_version: i64,
    ) -> Result<T, GuardError> {
        let id = record.id();
        let fail = |e| GuardError::from_storage(T::TABLE, id, e);
        let conn = self.connect()?;

        let written = record.write_if_version(&conn, expected_version).map_err(fail)?;
        if written == 0 {
            return match T::find(&conn, id).map_err(fail)? {
                None => Err(GuardError::NotFound { table: T::TABLE, id }),
                Some(current) => {
                    debug!(
                        table = T::TABLE,
                        id,
                        expected = expected_version,
                        actual = current.version(),
                        "Stale version rejected"
                    );
                    Err(GuardError::Conflict {
                        table: T::TABLE,
                        id,
                        expected: expected_version,
                        actual: current.version(),
                    })
                }
            };
        }

        T::find(&conn, id)
            .map_err(fail)?
            .ok_or(GuardError::NotFound { table: T::TABLE, id })
    }

    /// Run `mutate` against the current state of record `id` using the
    /// protocol the endpoint declared.
    pub fn apply<T, F>(&self, id: i64, mutation: Mutation, mutate: F) -> Result<T, GuardError>
    where
        T: Versioned + Lockable,
        F: FnOnce(&mut T) -> Result<(), GuardError>,
    {
        match mutation {
            Mutation::Pessimistic => self.update_exclusive(id, mutate),
            Mutation::Optimistic { expected_version } => {
                let conn = self.connect()?;
                let mut record = T::find(&conn, id)
                    .map_err(|e| GuardError::from_storage(T::TABLE, id, e))?
                    .ok_or(GuardError::NotFound { table: T::TABLE, id })?;
                drop(conn);

                mutate(&mut record)?;
                self.commit_versioned(&record, expected_version)
            }
        }
    }
}
