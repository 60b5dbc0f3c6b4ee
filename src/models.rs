//! Data models for the catalog assistant.
//!
//! This module contains the product record shared by the catalog client,
//! the local cache and the product table, plus the reduced projection that
//! is handed back to the LLM.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single product from the supplier catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product barcode, unique within one fetch.
    pub barcode: String,
    /// Product title as listed on the storefront.
    pub title: String,
    /// Plain-text description (HTML already stripped).
    #[serde(default)]
    pub description: String,
    /// Sale price.
    pub price: f64,
    /// Public product page, if the API returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    /// Category name.
    #[serde(default)]
    pub category: String,
    /// Brand name.
    #[serde(default)]
    pub brand: String,
    /// Units in stock.
    #[serde(default)]
    pub stock: i64,
}

impl Product {
    /// Reduce the record to the fields the LLM needs for listing.
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            title: self.title.clone(),
            price: self.price,
        }
    }

    /// Whether the product is currently available.
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Title and price only. Keeps tool output small regardless of how large
/// the individual records are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub title: String,
    pub price: f64,
}

/// Collects products keyed by barcode, preserving first-seen order.
///
/// A later record with the same barcode replaces the earlier one in place.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    products: Vec<Product>,
    index: HashMap<String, usize>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product. Returns `true` if the barcode was new.
    pub fn insert(&mut self, product: Product) -> bool {
        match self.index.get(&product.barcode) {
            Some(&pos) => {
                self.products[pos] = product;
                false
            }
            None => {
                self.index.insert(product.barcode.clone(), self.products.len());
                self.products.push(product);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn build(self) -> Vec<Product> {
        self.products
    }
}

#[cfg(test)]
pub(crate) fn sample_product(barcode: &str, title: &str, price: f64) -> Product {
    Product {
        barcode: barcode.to_string(),
        title: title.to_string(),
        description: format!("Description of {}", title),
        price,
        product_url: Some(format!("https://www.trendyol.com/p/{}", barcode)),
        category: "Organic Food".to_string(),
        brand: "Beyorganik".to_string(),
        stock: 12,
    }
}
