//! Configuration file handling.
//!
//! This module handles loading `.catalog-agent.toml`, merging it with CLI
//! arguments and environment values, and validating the result. The merged
//! [`Config`] is built once at startup and passed by reference to every
//! component that needs it.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".catalog-agent.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Remote catalog API settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Local JSON cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Relational store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Orchestrator limits.
    #[serde(default)]
    pub agent: AgentSettings,
}

/// Which chat API dialect to speak.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Ollama `/api/chat`
    #[default]
    Ollama,
    /// OpenAI-compatible `/chat/completions`
    Openai,
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Chat API dialect.
    #[serde(default)]
    pub provider: Provider,

    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the chat API.
    #[serde(default = "default_llm_url")]
    pub url: String,

    /// API key for hosted providers. Never written back to disk.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            name: default_model(),
            url: default_llm_url(),
            api_key: None,
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_llm_timeout() -> u64 {
    300
}

/// Remote catalog API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// API gateway base URL.
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// Supplier (seller) identifier.
    #[serde(default)]
    pub supplier_id: String,

    /// Value sent verbatim as the `Authorization` header.
    #[serde(default, skip_serializing)]
    pub auth: String,

    /// Products requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Only fetch products that are currently on sale.
    #[serde(default = "default_true")]
    pub on_sale_only: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_catalog_timeout")]
    pub timeout_seconds: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            supplier_id: String::new(),
            auth: String::new(),
            page_size: default_page_size(),
            on_sale_only: true,
            timeout_seconds: default_catalog_timeout(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://apigw.trendyol.com".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

fn default_catalog_timeout() -> u64 {
    30
}

/// Local JSON cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path of the cache file.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/external/products.json")
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. Takes precedence over the individual fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// MySQL host.
    #[serde(default = "default_db_host")]
    pub host: String,

    /// MySQL port.
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// MySQL user.
    #[serde(default)]
    pub user: String,

    /// MySQL password. Never written back to disk.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Database name.
    #[serde(default)]
    pub name: String,

    /// Seconds to wait for a connection.
    #[serde(default = "default_db_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_db_host(),
            port: default_db_port(),
            user: String::new(),
            password: String::new(),
            name: String::new(),
            connect_timeout_seconds: default_db_timeout(),
        }
    }
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_db_timeout() -> u64 {
    10
}

impl DatabaseConfig {
    /// Build the connection URL from either `url` or the MySQL fields.
    pub fn connection_url(&self) -> Result<String> {
        if let Some(ref url) = self.url {
            return Ok(url.clone());
        }

        if self.user.is_empty() || self.name.is_empty() {
            bail!("database user and name must be set (MYSQL_USER, DB)");
        }

        let mut url = reqwest::Url::parse(&format!("mysql://{}:{}/{}", self.host, self.port, self.name))
            .with_context(|| format!("Invalid database host: {}", self.host))?;
        url.set_username(&self.user)
            .map_err(|_| anyhow::anyhow!("Invalid database user"))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| anyhow::anyhow!("Invalid database password"))?;
        }

        Ok(url.to_string())
    }
}

/// Orchestrator limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum LLM round trips per query.
    #[serde(default = "default_max_rounds")]
    pub max_tool_rounds: usize,

    /// Messages kept after the system prompt and user query (sliding window).
    #[serde(default = "default_context_messages")]
    pub max_context_messages: usize,

    /// Cap on entries returned by the title/price listing.
    #[serde(default = "default_summary_items")]
    pub max_summary_items: usize,

    /// Cap on full records returned by a details lookup.
    #[serde(default = "default_detail_items")]
    pub max_detail_items: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_rounds(),
            max_context_messages: default_context_messages(),
            max_summary_items: default_summary_items(),
            max_detail_items: default_detail_items(),
        }
    }
}

fn default_max_rounds() -> usize {
    8
}

fn default_context_messages() -> usize {
    20
}

fn default_summary_items() -> usize {
    100
}

fn default_detail_items() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments and environment values.
    ///
    /// Only values that were explicitly provided override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(provider) = args.provider {
            self.model.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.llm_url {
            self.model.url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(ref key) = args.openai_api_key {
            self.model.api_key = Some(key.clone());
        }

        if let Some(ref supplier) = args.supplier_id {
            self.catalog.supplier_id = supplier.clone();
        }
        if let Some(ref auth) = args.trendyol_auth {
            self.catalog.auth = auth.clone();
        }

        if let Some(ref path) = args.cache {
            self.cache.path = path.clone();
        }

        if let Some(ref host) = args.mysql_host {
            self.database.host = host.clone();
        }
        if let Some(ref user) = args.mysql_user {
            self.database.user = user.clone();
        }
        if let Some(ref password) = args.mysql_password {
            self.database.password = password.clone();
        }
        if let Some(ref name) = args.db {
            self.database.name = name.clone();
        }
        if let Some(ref url) = args.database_url {
            self.database.url = Some(url.clone());
        }

        if let Some(rounds) = args.max_rounds {
            self.agent.max_tool_rounds = rounds;
        }
    }

    /// Validate settings needed before the first LLM call.
    ///
    /// Catalog and database credentials are checked lazily by the tools that
    /// use them, so a cache-only session still works without them.
    pub fn validate(&self) -> Result<()> {
        if !self.model.url.starts_with("http://") && !self.model.url.starts_with("https://") {
            bail!("LLM URL must start with 'http://' or 'https://'");
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            bail!("Temperature must be between 0.0 and 2.0");
        }

        if self.model.provider == Provider::Openai && self.model.api_key.is_none() {
            bail!("OPENAI_API_KEY is required for the openai provider");
        }

        if self.model.timeout_seconds == 0 || self.catalog.timeout_seconds == 0 {
            bail!("Timeouts must be at least 1 second");
        }

        if self.agent.max_tool_rounds == 0 {
            bail!("max_tool_rounds must be at least 1");
        }

        if self.agent.max_summary_items == 0 || self.agent.max_detail_items == 0 {
            bail!("Result caps must be at least 1");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
