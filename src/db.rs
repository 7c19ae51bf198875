//! SQLite connection setup shared by the credential and catalog stores.

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Open a connection with the pragmas every store relies on.
///
/// `busy_timeout` bounds how long a writer waits for another writer's lock
/// before failing with `SQLITE_BUSY`.
pub fn open(path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

/// One-time database setup: WAL so readers never wait on the lock holder.
pub fn init(path: &Path) -> rusqlite::Result<()> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
    Ok(())
}

/// `SQLITE_BUSY` / `SQLITE_LOCKED` after the busy timeout ran out.
pub fn is_lock_timeout(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
