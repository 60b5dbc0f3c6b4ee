//! Tool definitions for the catalog agent.
//!
//! The set of tools is closed: [`ToolName`] enumerates them, the registry
//! handed to the model is generated from it, and every call is parsed into a
//! typed [`ToolRequest`] before anything runs. A name the model invents is
//! rejected as [`ToolError::UnknownTool`].

use crate::agent::backend::ToolCall;
use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::error::ToolError;
use crate::models::Product;
use crate::store::{ProductCache, ProductTable};
use crate::summary::{project, KeywordFilter};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Tool definition in the function-calling format shared by Ollama and
/// OpenAI.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Every tool the model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    RefreshCatalog,
    SyncDatabase,
    ListTitlesAndPrices,
    GetProductDetails,
    CacheStatus,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::RefreshCatalog,
        ToolName::SyncDatabase,
        ToolName::ListTitlesAndPrices,
        ToolName::GetProductDetails,
        ToolName::CacheStatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::RefreshCatalog => "refresh_catalog",
            ToolName::SyncDatabase => "sync_database",
            ToolName::ListTitlesAndPrices => "list_titles_and_prices",
            ToolName::GetProductDetails => "get_product_details",
            ToolName::CacheStatus => "cache_status",
        }
    }

    fn description(self) -> &'static str {
        match self {
            ToolName::RefreshCatalog => "Download the current product catalog from the supplier API and overwrite the local cache. Slow; only use when the user asks for fresh data or the cache is missing.",
            ToolName::SyncDatabase => "Insert or replace every cached product in the MySQL products table, keyed by barcode.",
            ToolName::ListTitlesAndPrices => "List product titles and prices. Pass short keywords in `query` to filter by title (all keywords must match). Use this first for any product question.",
            ToolName::GetProductDetails => "Get full details (description, category, brand, stock, link) for one product by barcode, or for the first few products whose title matches `query`.",
            ToolName::CacheStatus => "Report how many products are cached and when the cache was last refreshed.",
        }
    }

    fn parameters(self) -> Value {
        match self {
            ToolName::ListTitlesAndPrices => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Keywords that must all appear in the title, e.g. 'ginger' or 'bal 850'"
                    },
                    "source": {
                        "type": "string",
                        "enum": ["cache", "database"],
                        "description": "Where to read from (default: cache)"
                    }
                },
                "required": []
            }),
            ToolName::GetProductDetails => json!({
                "type": "object",
                "properties": {
                    "barcode": {
                        "type": "string",
                        "description": "Exact product barcode"
                    },
                    "query": {
                        "type": "string",
                        "description": "Title keywords, used when no barcode is known"
                    }
                },
                "required": []
            }),
            _ => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.as_str().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Get the tool registry handed to the model.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.into_iter().map(ToolName::definition).collect()
}

/// Where a listing reads products from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Cache,
    Database,
}

/// A validated tool call with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    RefreshCatalog,
    SyncDatabase,
    ListTitlesAndPrices {
        source: Source,
        query: Option<String>,
    },
    GetProductDetails {
        barcode: Option<String>,
        query: Option<String>,
    },
    CacheStatus,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default)]
    source: Source,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailArgs {
    #[serde(default)]
    barcode: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ToolRequest {
    /// Resolve the tool name and decode its arguments.
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        let name: ToolName = call.name.parse()?;

        let arguments = match &call.arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: name.to_string(),
            reason: e.to_string(),
        };

        let request = match name {
            ToolName::RefreshCatalog => ToolRequest::RefreshCatalog,
            ToolName::SyncDatabase => ToolRequest::SyncDatabase,
            ToolName::CacheStatus => ToolRequest::CacheStatus,
            ToolName::ListTitlesAndPrices => {
                let args: ListArgs = serde_json::from_value(arguments).map_err(invalid)?;
                ToolRequest::ListTitlesAndPrices {
                    source: args.source,
                    query: non_blank(args.query),
                }
            }
            ToolName::GetProductDetails => {
                let args: DetailArgs = serde_json::from_value(arguments).map_err(invalid)?;
                let barcode = non_blank(args.barcode);
                let query = non_blank(args.query);
                if barcode.is_none() && query.is_none() {
                    return Err(ToolError::InvalidArguments {
                        tool: name.to_string(),
                        reason: "either barcode or query is required".to_string(),
                    });
                }
                ToolRequest::GetProductDetails { barcode, query }
            }
        };

        Ok(request)
    }

    pub fn name(&self) -> ToolName {
        match self {
            ToolRequest::RefreshCatalog => ToolName::RefreshCatalog,
            ToolRequest::SyncDatabase => ToolName::SyncDatabase,
            ToolRequest::ListTitlesAndPrices { .. } => ToolName::ListTitlesAndPrices,
            ToolRequest::GetProductDetails { .. } => ToolName::GetProductDetails,
            ToolRequest::CacheStatus => ToolName::CacheStatus,
        }
    }
}

/// Runs tool requests against the catalog API, cache and table.
pub struct ToolExecutor<'a> {
    config: &'a Config,
    cache: ProductCache,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            cache: ProductCache::new(&config.cache.path),
        }
    }

    /// Execute a request and return the text handed back to the model.
    pub async fn execute(&self, request: &ToolRequest) -> Result<String, ToolError> {
        debug!("Executing tool {}: {:?}", request.name(), request);

        match request {
            ToolRequest::RefreshCatalog => self.refresh_catalog().await,
            ToolRequest::SyncDatabase => self.sync_database().await,
            ToolRequest::ListTitlesAndPrices { source, query } => {
                self.list_titles_and_prices(*source, query.as_deref()).await
            }
            ToolRequest::GetProductDetails { barcode, query } => {
                self.get_product_details(barcode.as_deref(), query.as_deref())
            }
            ToolRequest::CacheStatus => self.cache_status(),
        }
    }

    /// Fetch the whole catalog, then replace the cache. Nothing is written
    /// if the fetch fails.
    async fn refresh_catalog(&self) -> Result<String, ToolError> {
        let client = CatalogClient::new(&self.config.catalog)?;
        let products = client.fetch_all().await?;
        self.cache.save(&products)?;

        Ok(format!(
            "Fetched {} products and saved them to {}",
            products.len(),
            self.cache.path().display()
        ))
    }

    async fn sync_database(&self) -> Result<String, ToolError> {
        let products = self.cache.load()?;

        let table = ProductTable::connect(&self.config.database).await?;
        let outcome = async {
            table.ensure_table().await?;
            let written = table.upsert(&products).await?;
            let total = table.count().await?;
            Ok::<_, sqlx::Error>((written, total))
        }
        .await;
        table.close().await;

        let (written, total) = outcome?;
        info!("Synced {} products ({} rows in table)", written, total);
        Ok(format!(
            "Upserted {} products into the products table ({} rows total)",
            written, total
        ))
    }

    async fn list_titles_and_prices(
        &self,
        source: Source,
        query: Option<&str>,
    ) -> Result<String, ToolError> {
        let summaries = match source {
            Source::Cache => self
                .cache
                .load()?
                .iter()
                .map(Product::summary)
                .collect::<Vec<_>>(),
            Source::Database => {
                let table = ProductTable::connect(&self.config.database).await?;
                let rows = table.titles_and_prices().await;
                table.close().await;
                rows?
            }
        };

        let filter = KeywordFilter::parse(query);
        let projection = project(summaries, &filter, self.config.agent.max_summary_items);
        if projection.items.is_empty() {
            return Err(ToolError::NoMatches(filter.describe()));
        }

        debug!(
            "Listing {} of {} matching products",
            projection.items.len(),
            projection.matched
        );
        Ok(projection.render()?)
    }

    fn get_product_details(
        &self,
        barcode: Option<&str>,
        query: Option<&str>,
    ) -> Result<String, ToolError> {
        let products: Vec<Product> = match (barcode, query) {
            (Some(barcode), _) => self
                .cache
                .find_by_barcode(barcode)?
                .into_iter()
                .collect(),
            (None, Some(query)) => {
                let filter = KeywordFilter::parse(Some(query));
                self.cache
                    .load()?
                    .into_iter()
                    .filter(|p| filter.matches(&p.title))
                    .take(self.config.agent.max_detail_items)
                    .collect()
            }
            (None, None) => {
                return Err(ToolError::InvalidArguments {
                    tool: ToolName::GetProductDetails.to_string(),
                    reason: "either barcode or query is required".to_string(),
                })
            }
        };

        if products.is_empty() {
            let what = match barcode {
                Some(b) => format!("barcode {}", b),
                None => format!("\"{}\"", query.unwrap_or_default()),
            };
            return Err(ToolError::NoMatches(what));
        }

        Ok(serde_json::to_string(&products)?)
    }

    fn cache_status(&self) -> Result<String, ToolError> {
        Ok(serde_json::to_string(&self.cache.status()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, CatalogError};
    use crate::models::sample_product;
    use crate::test_support::{seed_cache, spawn_server, test_config};
    use axum::routing::get;
    use axum::{Json, Router};
    use tempfile::TempDir;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_0".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            sample_product("1", "Organic Ginger Shot", 39.9),
            sample_product("2", "Ginger Tea", 85.0),
            sample_product("3", "Raw Honey", 250.0),
        ]
    }

    #[test]
    fn test_tool_definitions() {
        let tools = get_tool_definitions();
        assert_eq!(tools.len(), 5);

        for tool in &tools {
            assert_eq!(tool.tool_type, "function");
            let parsed: ToolName = tool.function.name.parse().unwrap();
            assert_eq!(parsed.as_str(), tool.function.name);
        }
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        let err = ToolRequest::parse(&call("delete_everything", json!({}))).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(ref name) if name == "delete_everything"));
    }

    #[test]
    fn test_parse_list_defaults_and_source() {
        let request = ToolRequest::parse(&call("list_titles_and_prices", Value::Null)).unwrap();
        assert_eq!(
            request,
            ToolRequest::ListTitlesAndPrices {
                source: Source::Cache,
                query: None
            }
        );

        let request = ToolRequest::parse(&call(
            "list_titles_and_prices",
            json!({"source": "database", "query": "  "}),
        ))
        .unwrap();
        assert_eq!(
            request,
            ToolRequest::ListTitlesAndPrices {
                source: Source::Database,
                query: None
            }
        );
        assert_eq!(request.name(), ToolName::ListTitlesAndPrices);
    }

    #[test]
    fn test_parse_invalid_arguments() {
        let err = ToolRequest::parse(&call("list_titles_and_prices", json!({"source": "ftp"})))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let err = ToolRequest::parse(&call("get_product_details", json!({}))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_list_from_cache_is_title_and_price_only() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        seed_cache(&config, &catalog());
        let executor = ToolExecutor::new(&config);

        let output = executor
            .execute(&ToolRequest::ListTitlesAndPrices {
                source: Source::Cache,
                query: Some("ginger".to_string()),
            })
            .await
            .unwrap();

        let value: Value = serde_json::from_str(&output).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        for item in items {
            let keys: Vec<_> = item.as_object().unwrap().keys().cloned().collect();
            assert_eq!(keys.len(), 2);
            assert!(keys.contains(&"title".to_string()));
            assert!(keys.contains(&"price".to_string()));
        }
    }

    #[tokio::test]
    async fn test_list_without_matches_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        seed_cache(&config, &catalog());
        let executor = ToolExecutor::new(&config);

        let err = executor
            .execute(&ToolRequest::ListTitlesAndPrices {
                source: Source::Cache,
                query: Some("mango".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NoMatches(_)));
    }

    #[tokio::test]
    async fn test_list_without_cache_is_missing_cache() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        let executor = ToolExecutor::new(&config);

        let err = executor
            .execute(&ToolRequest::ListTitlesAndPrices {
                source: Source::Cache,
                query: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cache(CacheError::Missing(_))));
    }

    #[tokio::test]
    async fn test_sync_database_twice_then_list_from_database() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        seed_cache(&config, &catalog());
        let executor = ToolExecutor::new(&config);

        let first = executor.execute(&ToolRequest::SyncDatabase).await.unwrap();
        let second = executor.execute(&ToolRequest::SyncDatabase).await.unwrap();
        assert!(first.contains("3 rows total"));
        assert!(second.contains("3 rows total"));

        let output = executor
            .execute(&ToolRequest::ListTitlesAndPrices {
                source: Source::Database,
                query: Some("honey".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(output, r#"[{"title":"Raw Honey","price":250.0}]"#);
    }

    #[tokio::test]
    async fn test_sync_without_database_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path());
        config.database.url = None;
        seed_cache(&config, &catalog());
        let executor = ToolExecutor::new(&config);

        let err = executor.execute(&ToolRequest::SyncDatabase).await.unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured("database", _)));
    }

    #[tokio::test]
    async fn test_product_details_by_barcode_and_query() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        seed_cache(&config, &catalog());
        let executor = ToolExecutor::new(&config);

        let output = executor
            .execute(&ToolRequest::GetProductDetails {
                barcode: Some("3".to_string()),
                query: None,
            })
            .await
            .unwrap();
        let products: Vec<Product> = serde_json::from_str(&output).unwrap();
        assert_eq!(products, vec![sample_product("3", "Raw Honey", 250.0)]);

        let output = executor
            .execute(&ToolRequest::GetProductDetails {
                barcode: None,
                query: Some("ginger".to_string()),
            })
            .await
            .unwrap();
        let products: Vec<Product> = serde_json::from_str(&output).unwrap();
        assert_eq!(products.len(), 2);

        let err = executor
            .execute(&ToolRequest::GetProductDetails {
                barcode: Some("404".to_string()),
                query: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NoMatches(ref what) if what == "barcode 404"));
    }

    #[tokio::test]
    async fn test_cache_status() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        seed_cache(&config, &catalog());
        let executor = ToolExecutor::new(&config);

        let output = executor.execute(&ToolRequest::CacheStatus).await.unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["products"], 3);
        assert!(value["modified_at"].is_string());
    }

    #[tokio::test]
    async fn test_refresh_catalog_writes_cache() {
        let router = Router::new().route(
            "/integration/product/sellers/{supplier}/products",
            get(|| async {
                Json(json!({
                    "totalPages": 1,
                    "content": [{"barcode": "G1", "title": "Organic Ginger Shot", "salePrice": 39.9}]
                }))
            }),
        );
        let base = spawn_server(router).await;

        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path());
        config.catalog.base_url = base;
        let executor = ToolExecutor::new(&config);

        let output = executor.execute(&ToolRequest::RefreshCatalog).await.unwrap();
        assert!(output.starts_with("Fetched 1 products"));

        let cached = ProductCache::new(&config.cache.path).load().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].title, "Organic Ginger Shot");
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_cache_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(temp_dir.path());
        seed_cache(&config, &catalog());
        let before = std::fs::read_to_string(&config.cache.path).unwrap();
        let executor = ToolExecutor::new(&config);

        let err = executor.execute(&ToolRequest::RefreshCatalog).await.unwrap_err();
        assert!(matches!(err, ToolError::Catalog(CatalogError::Request(_))));

        let after = std::fs::read_to_string(&config.cache.path).unwrap();
        assert_eq!(before, after);
    }
}
