//! Shared helpers for unit tests.

use crate::config::Config;
use crate::models::Product;
use crate::store::cache::ProductCache;
use std::path::Path;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A config whose cache and SQLite database both live under `dir`, and whose
/// catalog API points at a port nothing listens on.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.cache.path = dir.join("products.json");
    config.database.url = Some(format!(
        "sqlite://{}?mode=rwc",
        dir.join("products.db").display()
    ));
    config.catalog.base_url = "http://127.0.0.1:1".to_string();
    config.catalog.supplier_id = "4242".to_string();
    config.catalog.auth = "Basic dGVzdDp0ZXN0".to_string();
    config.catalog.timeout_seconds = 5;
    config
}

/// Write `products` to the cache configured in `config`.
pub fn seed_cache(config: &Config, products: &[Product]) {
    ProductCache::new(&config.cache.path).save(products).unwrap();
}
