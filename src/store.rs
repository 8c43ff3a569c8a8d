use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};

use crate::models::Product;

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new Store instance.
    /// This will automatically create the database file if it doesn't exist.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());

        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool })
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                image_url TEXT,
                price REAL NOT NULL,
                artisan_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                action TEXT NOT NULL,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    /// All catalog products, ordered by id.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, image_url, price, artisan_name
            FROM products
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch products")?;

        let mut products = Vec::with_capacity(rows.len());

        for row in rows {
            products.push(Product {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                image_url: row.try_get("image_url")?,
                price: row.try_get("price")?,
                artisan_name: row.try_get("artisan_name")?,
            });
        }

        Ok(products)
    }

    /// Append one user action to the activity log.
    pub async fn insert_activity_log(&self, user_id: &str, action: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_activity_log (user_id, action)
            VALUES (?, ?)
            "#,
        )
        .bind(user_id)
        .bind(action)
        .execute(&self.pool)
        .await
        .context("Failed to insert activity log entry")?;

        Ok(())
    }
}
