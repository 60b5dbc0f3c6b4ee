//! JSON file cache of the product catalog.

use crate::error::CacheError;
use crate::models::Product;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Snapshot of what is currently cached.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub path: String,
    pub products: usize,
    pub in_stock: usize,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Reads and writes the catalog as a UTF-8 JSON array.
#[derive(Debug, Clone)]
pub struct ProductCache {
    path: PathBuf,
}

impl ProductCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.display_path(),
            source,
        }
    }

    /// Replace the cache with `products`.
    ///
    /// The new content is written to a sibling temp file and renamed over
    /// the old one, so readers see either the old or the new catalog.
    pub fn save(&self, products: &[Product]) -> Result<(), CacheError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let json = serde_json::to_string_pretty(products)
            .map_err(|e| self.io_error(std::io::Error::other(e)))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        info!("Saved {} products to {}", products.len(), self.path.display());
        Ok(())
    }

    /// Load the cached catalog.
    pub fn load(&self) -> Result<Vec<Product>, CacheError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::Missing(self.display_path()));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let products: Vec<Product> =
            serde_json::from_str(&content).map_err(|source| CacheError::Malformed {
                path: self.display_path(),
                source,
            })?;

        debug!("Loaded {} products from {}", products.len(), self.path.display());
        Ok(products)
    }

    /// Look up one product by barcode.
    pub fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, CacheError> {
        Ok(self.load()?.into_iter().find(|p| p.barcode == barcode))
    }

    /// Report size and age of the cache.
    pub fn status(&self) -> Result<CacheStatus, CacheError> {
        let products = self.load()?;
        let modified_at = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(CacheStatus {
            path: self.display_path(),
            products: products.len(),
            in_stock: products.iter().filter(|p| p.in_stock()).count(),
            modified_at,
        })
    }
}
