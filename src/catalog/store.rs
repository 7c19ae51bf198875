//! Catalog Store
//! Mission: Persist categories and products; every edit of an existing row goes
//! through the concurrency guard via the `Record` impls below

use crate::catalog::models::{
    Category, DashboardCounts, Product, ProductPage, ProductSummary, ProductView,
};
use crate::concurrency::{Lockable, Record, Versioned};
use crate::db;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("category '{0}' already exists")]
    DuplicateCategory(String),
    #[error("category {0} not found")]
    UnknownCategory(i64),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
    })
}

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category_id: row.get(4)?,
        status: row.get(5)?,
    })
}

fn row_to_view(row: &Row<'_>) -> rusqlite::Result<ProductView> {
    Ok(ProductView {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category_id: row.get(4)?,
        status: row.get(5)?,
        category_name: row.get(6)?,
    })
}

const PRODUCT_VIEW_SQL: &str = "SELECT p.id, p.name, p.description, p.price, p.category_id, p.status, c.name
     FROM product p JOIN category c ON c.id = p.category_id";

impl Record for Category {
    const TABLE: &'static str = "category";

    fn id(&self) -> i64 {
        self.id
    }

    fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            "SELECT id, name, version FROM category WHERE id = ?1",
            params![id],
            row_to_category,
        )
        .optional()
    }
}

impl Versioned for Category {
    fn version(&self) -> i64 {
        self.version
    }

    fn write_if_version(&self, conn: &Connection, expected: i64) -> rusqlite::Result<usize> {
        conn.execute(
            "UPDATE category SET name = ?1, version = version + 1 WHERE id = ?2 AND version = ?3",
            params![self.name, self.id, expected],
        )
    }
}

impl Lockable for Category {
    // Locked writes still advance the version so optimistic readers notice.
    fn write(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "UPDATE category SET name = ?1, version = version + 1 WHERE id = ?2",
            params![self.name, self.id],
        )?;
        Ok(())
    }

    fn remove(conn: &Connection, id: i64) -> rusqlite::Result<()> {
        conn.execute("DELETE FROM category WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl Record for Product {
    const TABLE: &'static str = "product";

    fn id(&self) -> i64 {
        self.id
    }

    fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            "SELECT id, name, description, price, category_id, status FROM product WHERE id = ?1",
            params![id],
            row_to_product,
        )
        .optional()
    }
}

impl Lockable for Product {
    fn write(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "UPDATE product SET name = ?1, description = ?2, price = ?3, category_id = ?4, status = ?5
             WHERE id = ?6",
            params![
                self.name,
                self.description,
                self.price,
                self.category_id,
                self.status,
                self.id
            ],
        )?;
        Ok(())
    }

    fn remove(conn: &Connection, id: i64) -> rusqlite::Result<()> {
        conn.execute("DELETE FROM product WHERE id = ?1", params![id])?;
        Ok(())
    }
}

/// Category exists check usable inside a lock holder's transaction.
pub fn category_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM category WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Catalog storage with SQLite backend
pub struct CatalogStore {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl CatalogStore {
    pub fn new(db_path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, CatalogError> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            busy_timeout,
        };
        store.init_db()?;
        Ok(store)
    }

    fn conn(&self) -> rusqlite::Result<Connection> {
        db::open(&self.db_path, self.busy_timeout)
    }

    fn init_db(&self) -> Result<(), CatalogError> {
        db::init(&self.db_path)?;
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS product (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price INTEGER NOT NULL,
                category_id INTEGER NOT NULL REFERENCES category(id),
                status INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_product_category ON product(category_id);",
        )?;
        Ok(())
    }

    /// New categories start at version 0.
    pub fn add_category(&self, name: &str) -> Result<Category, CatalogError> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO category (name) VALUES (?1)", params![name])
            .map_err(|e| {
                if db::is_unique_violation(&e) {
                    CatalogError::DuplicateCategory(name.to_string())
                } else {
                    CatalogError::Sqlite(e)
                }
            })?;

        info!(name = %name, "📂 Category added");
        Ok(Category {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            version: 0,
        })
    }

    pub fn category(&self, id: i64) -> Result<Option<Category>, CatalogError> {
        Ok(Category::find(&self.conn()?, id)?)
    }

    /// All categories, or only those with at least one active product.
    pub fn categories(&self, active_only: bool) -> Result<Vec<Category>, CatalogError> {
        let conn = self.conn()?;
        let sql = if active_only {
            "SELECT id, name, version FROM category c
             WHERE EXISTS (SELECT 1 FROM product p WHERE p.category_id = c.id AND p.status = 1)
             ORDER BY name"
        } else {
            "SELECT id, name, version FROM category ORDER BY name"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], row_to_category)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn add_product(
        &self,
        name: &str,
        description: &str,
        price: i64,
        category_id: i64,
        status: bool,
    ) -> Result<Product, CatalogError> {
        let conn = self.conn()?;
        if !category_exists(&conn, category_id)? {
            return Err(CatalogError::UnknownCategory(category_id));
        }

        conn.execute(
            "INSERT INTO product (name, description, price, category_id, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, description, price, category_id, status],
        )?;

        info!(name = %name, category_id, "🍰 Product added");
        Ok(Product {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            price,
            category_id,
            status,
        })
    }

    pub fn products(&self) -> Result<Vec<ProductView>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY p.id", PRODUCT_VIEW_SQL))?;
        let rows = stmt
            .query_map([], row_to_view)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Active products of one category.
    pub fn products_by_category(&self, category_id: i64) -> Result<Vec<ProductSummary>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name FROM product WHERE category_id = ?1 AND status = 1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![category_id], |row| {
                Ok(ProductSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn product(&self, id: i64) -> Result<Option<ProductView>, CatalogError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("{} WHERE p.id = ?1", PRODUCT_VIEW_SQL),
                params![id],
                row_to_view,
            )
            .optional()?)
    }

    /// Zero-based page of products ordered by id.
    pub fn product_page(&self, page: u32, size: u32) -> Result<ProductPage, CatalogError> {
        let size = size.clamp(1, 100);
        let conn = self.conn()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM product", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT id, name, description, price, category_id, status FROM product
             ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;
        let offset = i64::from(page) * i64::from(size);
        let content = stmt
            .query_map(params![size, offset], row_to_product)?
            .collect::<Result<Vec<_>, _>>()?;

        let size_i = i64::from(size);
        Ok(ProductPage {
            content,
            page,
            size,
            total_elements: total,
            total_pages: (total + size_i - 1) / size_i,
        })
    }

    pub fn counts(&self) -> Result<DashboardCounts, CatalogError> {
        let conn = self.conn()?;
        let category = conn.query_row("SELECT COUNT(*) FROM category", [], |row| row.get(0))?;
        let product = conn.query_row("SELECT COUNT(*) FROM product", [], |row| row.get(0))?;
        Ok(DashboardCounts { category, product })
    }
}
