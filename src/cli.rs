//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap. Credentials
//! are normally supplied through environment variables (or a `.env` file);
//! the matching flags exist but are hidden from `--help`.

use crate::config::Provider;
use clap::Parser;
use std::path::PathBuf;

/// catalog-agent - ask an LLM about your Trendyol catalog
///
/// Starts an interactive prompt. The model answers product questions by
/// calling a fixed set of tools: refresh the catalog, sync it to MySQL,
/// list titles and prices, and look up product details.
///
/// Examples:
///   catalog-agent
///   catalog-agent --query "show me ginger products"
///   catalog-agent --provider openai --model gpt-4o-mini --llm-url https://api.openai.com/v1
///   catalog-agent --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .catalog-agent.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ask a single question and exit instead of starting the prompt
    #[arg(long, value_name = "TEXT")]
    pub query: Option<String>,

    /// Chat API dialect
    #[arg(long, value_name = "PROVIDER", env = "LLM_PROVIDER")]
    pub provider: Option<Provider>,

    /// Model to use
    #[arg(short, long, env = "CATALOG_AGENT_MODEL")]
    pub model: Option<String>,

    /// Base URL of the chat API
    #[arg(long, value_name = "URL", env = "LLM_URL")]
    pub llm_url: Option<String>,

    /// Temperature for LLM responses
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Path of the product cache file
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Maximum tool rounds per question
    #[arg(long, value_name = "COUNT")]
    pub max_rounds: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .catalog-agent.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    #[arg(long, env = "SUPPLIER_ID", hide = true)]
    pub supplier_id: Option<String>,

    #[arg(long, env = "TRENDYOL_AUTH", hide = true, hide_env_values = true)]
    pub trendyol_auth: Option<String>,

    #[arg(long, env = "MYSQL_HOST", hide = true)]
    pub mysql_host: Option<String>,

    #[arg(long, env = "MYSQL_USER", hide = true)]
    pub mysql_user: Option<String>,

    #[arg(long, env = "MYSQL_PASSWORD", hide = true, hide_env_values = true)]
    pub mysql_password: Option<String>,

    #[arg(long, env = "DB", hide = true)]
    pub db: Option<String>,

    #[arg(long, env = "DATABASE_URL", hide = true, hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide = true, hide_env_values = true)]
    pub openai_api_key: Option<String>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        let mut args = Self::parse();

        // Older .env files spell it SUPLIER_ID
        if args.supplier_id.is_none() {
            args.supplier_id = std::env::var("SUPLIER_ID").ok();
        }

        args
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref query) = self.query {
            if query.trim().is_empty() {
                return Err("--query must not be empty".to_string());
            }
        }

        if let Some(rounds) = self.max_rounds {
            if rounds == 0 {
                return Err("--max-rounds must be at least 1".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_starts_interactive() {
        let args = Args::parse_from(["catalog-agent"]);
        assert!(args.query.is_none());
        assert!(!args.init_config);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_provider_value() {
        let args = Args::parse_from(["catalog-agent", "--provider", "openai"]);
        assert_eq!(args.provider, Some(Provider::Openai));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = Args::parse_from(["catalog-agent", "--verbose", "--quiet"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_empty_query() {
        let args = Args::parse_from(["catalog-agent", "--query", "  "]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = Args::parse_from(["catalog-agent"]);
        assert_eq!(args.log_level(), tracing::Level::WARN);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
