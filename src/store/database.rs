//! Relational copy of the catalog.
//!
//! # Table: `products`
//!
//! Keyed by `barcode`. Rows are replaced wholesale on upsert, so running
//! the same sync twice leaves the table unchanged. The statements stick to
//! the SQL subset MySQL and SQLite share (`REPLACE INTO`, `?` placeholders),
//! which lets the same code run against MySQL in production and SQLite in
//! tests through sqlx's `Any` driver.

use crate::config::DatabaseConfig;
use crate::error::ToolError;
use crate::models::{Product, ProductSummary};
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, Row};
use std::time::Duration;
use tracing::{debug, info};

/// Longest value a MySQL `TEXT` column accepts, in bytes.
const MAX_TEXT_BYTES: usize = 65_535;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        barcode VARCHAR(128) NOT NULL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        price DOUBLE NOT NULL,
        productUrl TEXT NOT NULL,
        category TEXT NOT NULL,
        brand TEXT NOT NULL,
        stock BIGINT NOT NULL
    )
"#;

const UPSERT: &str = r#"
    REPLACE INTO products (barcode, title, description, price, productUrl, category, brand, stock)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

/// Handle to the product table. Owns a single-connection pool that is
/// released by [`ProductTable::close`] or on drop.
pub struct ProductTable {
    pool: AnyPool,
}

impl ProductTable {
    /// Connect using the configured URL or MySQL credentials.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ToolError> {
        let url = config
            .connection_url()
            .map_err(|e| ToolError::NotConfigured("database", format!("{:#}", e)))?;

        Ok(Self::connect_url(&url, config.connect_timeout_seconds).await?)
    }

    /// Connect to an explicit database URL.
    pub async fn connect_url(url: &str, timeout_seconds: u64) -> Result<Self, sqlx::Error> {
        install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(timeout_seconds))
            .connect(url)
            .await?;

        debug!("Connected to product database");
        Ok(Self { pool })
    }

    /// Create the table if it does not exist yet.
    pub async fn ensure_table(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert or replace every product in one transaction.
    ///
    /// Returns the number of products written.
    pub async fn upsert(&self, products: &[Product]) -> Result<usize, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for product in products {
            sqlx::query(UPSERT)
                .bind(product.barcode.clone())
                .bind(truncate_text(&product.title))
                .bind(truncate_text(&product.description))
                .bind(product.price)
                .bind(truncate_text(product.product_url.as_deref().unwrap_or("")))
                .bind(truncate_text(&product.category))
                .bind(truncate_text(&product.brand))
                .bind(product.stock)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!("Upserted {} products", products.len());
        Ok(products.len())
    }

    /// Title and price of every row, ordered by title.
    pub async fn titles_and_prices(&self) -> Result<Vec<ProductSummary>, sqlx::Error> {
        let rows = sqlx::query("SELECT title, price FROM products ORDER BY title, barcode")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ProductSummary {
                    title: row.try_get("title")?,
                    price: row.try_get("price")?,
                })
            })
            .collect()
    }

    /// Every row as a full product, ordered by barcode.
    #[cfg(test)]
    pub async fn load_all(&self) -> Result<Vec<Product>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT barcode, title, description, price, productUrl, category, brand, stock \
             FROM products ORDER BY barcode",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let url: String = row.try_get("productUrl")?;
                Ok(Product {
                    barcode: row.try_get("barcode")?,
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    price: row.try_get("price")?,
                    product_url: (!url.is_empty()).then_some(url),
                    category: row.try_get("category")?,
                    brand: row.try_get("brand")?,
                    stock: row.try_get("stock")?,
                })
            })
            .collect()
    }

    /// Number of rows in the table.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM products")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }

    /// Close the pool and its connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Cut `value` to the `TEXT` limit on a character boundary.
fn truncate_text(value: &str) -> String {
    if value.len() <= MAX_TEXT_BYTES {
        return value.to_string();
    }
    let mut end = MAX_TEXT_BYTES;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_product;

    async fn memory_table() -> ProductTable {
        let table = ProductTable::connect_url("sqlite::memory:", 5).await.unwrap();
        table.ensure_table().await.unwrap();
        table
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let table = memory_table().await;
        let products = vec![
            sample_product("2", "Raw Honey", 250.0),
            sample_product("1", "Organic Ginger Shot", 39.9),
        ];

        table.upsert(&products).await.unwrap();
        let first = table.load_all().await.unwrap();

        table.upsert(&products).await.unwrap();
        let second = table.load_all().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(table.count().await.unwrap(), 2);
        assert_eq!(second[0], products[1]);
        table.close().await;
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_barcode() {
        let table = memory_table().await;
        table
            .upsert(&[sample_product("1", "Ginger Shot", 39.9)])
            .await
            .unwrap();
        table
            .upsert(&[sample_product("1", "Ginger Shot 6-pack", 199.0)])
            .await
            .unwrap();

        let rows = table.titles_and_prices().await.unwrap();
        assert_eq!(
            rows,
            vec![ProductSummary {
                title: "Ginger Shot 6-pack".to_string(),
                price: 199.0
            }]
        );
    }

    #[tokio::test]
    async fn test_titles_and_prices_ordered_by_title() {
        let table = memory_table().await;
        table
            .upsert(&[
                sample_product("1", "Zeytinyağı", 400.0),
                sample_product("2", "Bal", 250.0),
            ])
            .await
            .unwrap();

        let titles: Vec<_> = table
            .titles_and_prices()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Bal", "Zeytinyağı"]);
    }

    #[tokio::test]
    async fn test_missing_url_round_trips_as_none() {
        let table = memory_table().await;
        let product = Product {
            product_url: None,
            ..sample_product("7", "Carob", 95.5)
        };
        table.upsert(&[product.clone()]).await.unwrap();
        assert_eq!(table.load_all().await.unwrap(), vec![product]);
    }

    #[test]
    fn test_truncate_text_respects_char_boundary() {
        let long = "ş".repeat(MAX_TEXT_BYTES);
        let cut = truncate_text(&long);
        assert!(cut.len() <= MAX_TEXT_BYTES);
        assert!(cut.chars().all(|c| c == 'ş'));
        assert_eq!(truncate_text("short"), "short");
    }
}
