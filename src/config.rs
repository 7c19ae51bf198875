//! Application Configuration
//! Mission: Read settings from flags / environment and refuse to start on weak ones
//!
//! Environment:
//!   CAFE_BIND_ADDR - Listen address (default: 0.0.0.0:8081)
//!   JWT_SECRET - Token signing secret, at least 32 bytes (required)
//!   CAFE_DB_PATH - SQLite database file (default: cafe.db)
//!   CAFE_LOCK_WAIT_MS - Max wait for an exclusive record lock (default: 5000)
//!   CAFE_BCRYPT_COST - bcrypt work factor (default: 12)
//!   CAFE_ADMIN_EMAIL / CAFE_ADMIN_PASSWORD - Bootstrap admin (optional)
//!   CAFE_LOGIN_RATE_LIMIT - Public auth requests per minute per IP (default: 30)

use crate::auth::jwt::MIN_SECRET_BYTES;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Startup configuration errors. Any of these aborts the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("signing secret is {len} bytes, need at least {min} (256 bits)")]
    WeakSigningSecret { len: usize, min: usize },
    #[error("bcrypt cost {0} outside supported range 4..=31")]
    InvalidBcryptCost(u32),
    #[error("lock wait must be greater than zero")]
    ZeroLockWait,
    #[error("bootstrap admin needs both CAFE_ADMIN_EMAIL and CAFE_ADMIN_PASSWORD")]
    IncompleteBootstrapAdmin,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "cafe")]
#[command(about = "Cafe management backend - catalog administration with stateless auth")]
pub struct AppConfig {
    /// Listen address
    #[arg(long, env = "CAFE_BIND_ADDR", default_value = "0.0.0.0:8081")]
    pub bind_addr: SocketAddr,

    /// HMAC signing secret for bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// SQLite database path
    #[arg(long, env = "CAFE_DB_PATH", default_value = "cafe.db")]
    pub db_path: String,

    /// Max milliseconds to wait for an exclusive record lock
    #[arg(long, env = "CAFE_LOCK_WAIT_MS", default_value = "5000")]
    pub lock_wait_ms: u64,

    /// bcrypt work factor for stored passwords
    #[arg(long, env = "CAFE_BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Email of the admin account created on first start
    #[arg(long, env = "CAFE_ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Password of the admin account created on first start
    #[arg(long, env = "CAFE_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Requests per minute per IP on login / signup / forgotPassword
    #[arg(long, env = "CAFE_LOGIN_RATE_LIMIT", default_value = "30")]
    pub login_rate_limit: u32,
}

impl AppConfig {
    /// Reject configurations that must never reach request handling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let len = self.jwt_secret.as_bytes().len();
        if len < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSigningSecret {
                len,
                min: MIN_SECRET_BYTES,
            });
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost(self.bcrypt_cost));
        }
        if self.lock_wait_ms == 0 {
            return Err(ConfigError::ZeroLockWait);
        }
        if self.admin_email.is_some() != self.admin_password.is_some() {
            return Err(ConfigError::IncompleteBootstrapAdmin);
        }
        Ok(())
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// Bootstrap admin credentials, if both halves are configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}
