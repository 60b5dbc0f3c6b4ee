//! Paginated client for the Trendyol supplier product API.

use crate::catalog::html::clean_html;
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::models::{CatalogBuilder, Product};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One page of the product listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    #[serde(default)]
    pub content: Vec<RemoteProduct>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: Option<u64>,
}

/// A product as the API returns it. Every field is optional on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProduct {
    pub barcode: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub sale_price: Option<f64>,
    pub list_price: Option<f64>,
    pub product_url: Option<String>,
    pub category_name: Option<String>,
    pub brand: Option<String>,
    pub quantity: Option<i64>,
}

impl RemoteProduct {
    /// Normalize into a [`Product`]. Items without a barcode are dropped.
    pub fn into_product(self) -> Option<Product> {
        let barcode = self.barcode.filter(|b| !b.trim().is_empty())?;

        Some(Product {
            barcode,
            title: self.title.unwrap_or_default(),
            description: clean_html(self.description.as_deref().unwrap_or("")),
            price: self.sale_price.or(self.list_price).unwrap_or(0.0),
            product_url: self.product_url,
            category: self.category_name.unwrap_or_default(),
            brand: self.brand.unwrap_or_default(),
            stock: self.quantity.unwrap_or(0),
        })
    }
}

/// Fetches the supplier's full catalog.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    supplier_id: String,
    auth: String,
    page_size: u32,
    on_sale_only: bool,
    timeout_seconds: u64,
}

impl CatalogClient {
    /// Create a client from the catalog settings.
    ///
    /// Fails if the supplier id or credential is missing.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        if config.supplier_id.trim().is_empty() {
            return Err(CatalogError::NotConfigured("SUPPLIER_ID"));
        }
        if config.auth.trim().is_empty() {
            return Err(CatalogError::NotConfigured("TRENDYOL_AUTH"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(format!("{} - SelfIntegration", config.supplier_id))
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            supplier_id: config.supplier_id.clone(),
            auth: config.auth.clone(),
            page_size: config.page_size.max(1),
            on_sale_only: config.on_sale_only,
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn products_url(&self) -> String {
        format!(
            "{}/integration/product/sellers/{}/products",
            self.base_url, self.supplier_id
        )
    }

    /// Fetch a single page.
    pub async fn fetch_page(&self, page: u32) -> Result<ProductPage, CatalogError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("size", self.page_size.to_string()),
        ];
        if self.on_sale_only {
            query.push(("onSale", "true".to_string()));
        }

        debug!("GET {} page={}", self.products_url(), page);

        let response = self
            .http
            .get(self.products_url())
            .header(reqwest::header::AUTHORIZATION, &self.auth)
            .query(&query)
            .send()
            .await
            .inspect_err(|e| {
                if e.is_timeout() {
                    warn!("Catalog request timed out after {}s", self.timeout_seconds);
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CatalogError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CatalogError::Decode {
            page,
            message: e.to_string(),
        })
    }

    /// Walk every page and return the deduplicated catalog.
    ///
    /// Any failing page fails the whole fetch; nothing partial is returned.
    pub async fn fetch_all(&self) -> Result<Vec<Product>, CatalogError> {
        info!("Fetching catalog for supplier {}", self.supplier_id);

        let mut catalog = CatalogBuilder::new();
        let mut skipped = 0usize;
        let mut page_num = 0u32;

        loop {
            let page = self.fetch_page(page_num).await?;
            let total_pages = page.total_pages;

            if page_num == 0 {
                if let Some(total) = page.total_elements {
                    debug!("Catalog reports {} products over {} pages", total, total_pages);
                }
            }

            for remote in page.content {
                match remote.into_product() {
                    Some(product) => {
                        catalog.insert(product);
                    }
                    None => skipped += 1,
                }
            }

            if page_num + 1 >= total_pages {
                break;
            }
            page_num += 1;
        }

        if skipped > 0 {
            warn!("Skipped {} products without a barcode", skipped);
        }
        info!("Fetched {} products", catalog.len());

        Ok(catalog.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn catalog_config(base_url: &str) -> CatalogConfig {
        CatalogConfig {
            base_url: base_url.to_string(),
            supplier_id: "4242".to_string(),
            auth: "Basic dGVzdDp0ZXN0".to_string(),
            page_size: 2,
            timeout_seconds: 5,
            ..CatalogConfig::default()
        }
    }

    async fn products(
        Path(supplier): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (AxumStatus, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if supplier != "4242" || auth != "Basic dGVzdDp0ZXN0" {
            return (AxumStatus::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
        }
        assert_eq!(query.get("onSale").map(String::as_str), Some("true"));

        let body = match query.get("page").map(String::as_str) {
            Some("0") => json!({
                "totalPages": 2,
                "totalElements": 4,
                "content": [
                    {"barcode": "A1", "title": "Organic Ginger Shot", "salePrice": 39.9,
                     "description": "<p>Zencefil <b>shot</b></p>", "categoryName": "Drinks",
                     "brand": "Beyorganik", "quantity": 10},
                    {"barcode": "B2", "title": "Raw Honey", "salePrice": 250.0},
                    {"title": "No barcode", "salePrice": 1.0}
                ]
            }),
            _ => json!({
                "totalPages": 2,
                "content": [
                    {"barcode": "B2", "title": "Raw Honey 850g", "listPrice": 275.0},
                    {"barcode": "C3", "title": "Carob Molasses", "salePrice": 95.5}
                ]
            }),
        };
        (AxumStatus::OK, Json(body))
    }

    fn router() -> Router {
        Router::new().route("/integration/product/sellers/{supplier}/products", get(products))
    }

    #[tokio::test]
    async fn test_fetch_all_walks_pages_and_dedupes() {
        let base = spawn_server(router()).await;
        let client = CatalogClient::new(&catalog_config(&base)).unwrap();

        let products = client.fetch_all().await.unwrap();
        let barcodes: Vec<_> = products.iter().map(|p| p.barcode.as_str()).collect();
        assert_eq!(barcodes, vec!["A1", "B2", "C3"]);

        assert_eq!(products[0].description, "Zencefil\nshot");
        assert_eq!(products[0].category, "Drinks");
        assert_eq!(products[0].stock, 10);
        assert_eq!(products[1].title, "Raw Honey 850g");
        assert_eq!(products[1].price, 275.0);
    }

    #[tokio::test]
    async fn test_rejected_credential_maps_to_unauthorized() {
        let base = spawn_server(router()).await;
        let mut config = catalog_config(&base);
        config.auth = "Basic wrong".to_string();
        let client = CatalogClient::new(&config).unwrap();

        let err = client.fetch_all().await.unwrap_err();
        assert!(matches!(err, CatalogError::Unauthorized { status: 401 }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let client = CatalogClient::new(&catalog_config("http://127.0.0.1:1")).unwrap();
        let err = client.fetch_all().await.unwrap_err();
        assert!(matches!(err, CatalogError::Request(_)));
    }

    #[tokio::test]
    async fn test_malformed_page_is_decode_error() {
        let router = Router::new().route(
            "/integration/product/sellers/{supplier}/products",
            get(|| async { "not json" }),
        );
        let base = spawn_server(router).await;
        let client = CatalogClient::new(&catalog_config(&base)).unwrap();

        let err = client.fetch_page(0).await.unwrap_err();
        assert!(matches!(err, CatalogError::Decode { page: 0, .. }));
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = CatalogConfig::default();
        assert!(matches!(
            CatalogClient::new(&config),
            Err(CatalogError::NotConfigured("SUPPLIER_ID"))
        ));

        config.supplier_id = "1".to_string();
        assert!(matches!(
            CatalogClient::new(&config),
            Err(CatalogError::NotConfigured("TRENDYOL_AUTH"))
        ));
    }
}
