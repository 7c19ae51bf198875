//! Middleware for observability and rate limiting.

pub mod logging;
pub mod rate_limit;

pub use logging::request_logging;
pub use rate_limit::{login_rate_limit, LoginRateLimiter};
