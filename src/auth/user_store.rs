//! Credential Store
//! Mission: Securely store and manage staff/admin accounts with SQLite

use crate::auth::models::{Role, User};
use crate::db;
use bcrypt::{hash, verify, DEFAULT_COST};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("user {0} not found")]
    NotFound(i64),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Outcome of a credential check. Callers map each case to its own message.
#[derive(Debug)]
pub enum LoginCheck {
    Approved(User),
    PendingApproval,
    BadCredentials,
}

/// User storage with SQLite backend
pub struct CredentialStore {
    db_path: PathBuf,
    busy_timeout: Duration,
    bcrypt_cost: u32,
}

const USER_COLUMNS: &str = "id, name, contact_number, email, password_hash, approved, role";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        contact_number: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        approved: row.get(5)?,
        role: Role::parse(&role).unwrap_or(Role::User),
    })
}

impl CredentialStore {
    /// Create a new credential store and initialize the schema
    pub fn new(db_path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            busy_timeout,
            bcrypt_cost: DEFAULT_COST,
        };
        store.init_db()?;
        Ok(store)
    }

    /// Lower costs are only sensible for tests.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    fn conn(&self) -> rusqlite::Result<Connection> {
        db::open(&self.db_path, self.busy_timeout)
    }

    fn init_db(&self) -> Result<(), StoreError> {
        db::init(&self.db_path)?;
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                contact_number TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                approved INTEGER NOT NULL DEFAULT 0,
                role TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Seed an approved admin account if no admin exists yet.
    pub fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        if count > 0 {
            return Ok(false);
        }

        let password_hash = hash(password, self.bcrypt_cost)?;
        conn.execute(
            "INSERT INTO users (name, contact_number, email, password_hash, approved, role)
             VALUES (?1, ?2, ?3, ?4, 1, 'admin')",
            params!["Administrator", "", email, password_hash],
        )?;

        info!(email = %email, "🔐 Bootstrap admin account created");
        Ok(true)
    }

    /// Register a new account: role `user`, awaiting admin approval.
    pub fn sign_up(
        &self,
        name: &str,
        contact_number: &str,
        email: &str,
        password: &str,
    ) -> Result<User, StoreError> {
        self.insert(name, contact_number, email, password, Role::User, false)
    }

    pub fn insert(
        &self,
        name: &str,
        contact_number: &str,
        email: &str,
        password: &str,
        role: Role,
        approved: bool,
    ) -> Result<User, StoreError> {
        let conn = self.conn()?;
        if self.find_by_email_with(&conn, email)?.is_some() {
            return Err(StoreError::DuplicateEmail(email.to_string()));
        }

        let password_hash = hash(password, self.bcrypt_cost)?;
        conn.execute(
            "INSERT INTO users (name, contact_number, email, password_hash, approved, role)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![name, contact_number, email, password_hash, approved, role.as_str()],
        )
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                StoreError::DuplicateEmail(email.to_string())
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        info!(email = %email, role = role.as_str(), "✅ Registered account");

        Ok(User {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            contact_number: contact_number.to_string(),
            email: email.to_string(),
            password_hash,
            approved,
            role,
        })
    }

    fn find_by_email_with(&self, conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            row_to_user,
        )
        .optional()
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        Ok(self.find_by_email_with(&conn, email)?)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                row_to_user,
            )
            .optional()?)
    }

    /// Verify email + password and approval status.
    pub fn check_login(&self, email: &str, password: &str) -> Result<LoginCheck, StoreError> {
        let Some(user) = self.find_by_email(email)? else {
            return Ok(LoginCheck::BadCredentials);
        };
        if !verify(password, &user.password_hash)? {
            warn!(email = %email, "❌ Password mismatch");
            return Ok(LoginCheck::BadCredentials);
        }
        if !user.approved {
            return Ok(LoginCheck::PendingApproval);
        }
        Ok(LoginCheck::Approved(user))
    }

    /// All `user`-role accounts (admin listing)
    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE role = 'user' ORDER BY id",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn admin_emails(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT email FROM users WHERE role = 'admin' ORDER BY id")?;
        let emails = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(emails)
    }

    /// Approve or disable an account.
    pub fn update_status(&self, id: i64, approved: bool) -> Result<User, StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users SET approved = ?1 WHERE id = ?2",
            params![approved, id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        drop(conn);

        info!(user_id = id, approved, "Account status updated");
        self.find_by_id(id)?.ok_or(StoreError::NotFound(id))
    }

    /// Returns `false` when `old_password` does not match.
    pub fn change_password(
        &self,
        email: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<bool, StoreError> {
        let Some(user) = self.find_by_email(email)? else {
            return Ok(false);
        };
        if !verify(old_password, &user.password_hash)? {
            return Ok(false);
        }

        let new_hash = hash(new_password, self.bcrypt_cost)?;
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![new_hash, user.id],
        )?;
        info!(email = %email, "Password changed");
        Ok(true)
    }
}
