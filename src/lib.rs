//! Cafe Backend Library
//!
//! Exposes the router, stores and auth primitives for the binary and tests.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod concurrency;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod notify;

pub use api::{build_router, AppState};
pub use config::AppConfig;
