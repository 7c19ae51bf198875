//! Catalog Module
//! Mission: Menu categories and products, every edit concurrency-guarded

pub mod api;
pub mod models;
pub mod store;

pub use models::{Category, Product};
pub use store::{CatalogError, CatalogStore};
