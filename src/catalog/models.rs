//! Catalog Models
//! Mission: Category / product records and their request/response shapes

use serde::{Deserialize, Serialize};

/// Menu category. Edited optimistically through `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub version: i64,
}

/// Menu item. Edited under an exclusive lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub category_id: i64,
    pub status: bool,
}

/// Product joined with its category name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub status: bool,
    pub category_id: i64,
    pub category_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub content: Vec<Product>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardCounts {
    pub category: i64,
    pub product: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

/// Optimistic edit: carries the version the client read.
#[derive(Debug, Deserialize)]
pub struct CategoryUpdate {
    pub id: i64,
    pub name: String,
    pub version: i64,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRename {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryFilter {
    #[serde(rename = "filterValue")]
    pub filter_value: Option<String>,
}

impl CategoryFilter {
    pub fn active_only(&self) -> bool {
        self.filter_value
            .as_deref()
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    pub category_id: i64,
    #[serde(default = "default_status")]
    pub status: bool,
}

fn default_status() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    pub category_id: i64,
    pub status: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ProductStatusUpdate {
    pub id: i64,
    pub status: bool,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    10
}
