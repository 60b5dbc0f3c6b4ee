//! catalog-agent - LLM-driven product assistant for a Trendyol catalog
//!
//! A CLI that lets a tool-calling model answer product questions by
//! refreshing, caching, syncing and summarizing the supplier catalog.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Startup error, or the one-shot --query failed

mod agent;
mod catalog;
mod cli;
mod config;
mod error;
mod models;
mod store;
mod summary;

#[cfg(test)]
mod test_support;

use agent::{build_backend, ProductAgent};
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials usually live in .env next to the binary
    let dotenv = dotenvy::dotenv();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("catalog-agent v{}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env loaded: {}", e),
    }

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Startup failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .catalog-agent.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Credentials stay in the environment (SUPPLIER_ID, TRENDYOL_AUTH, MYSQL_*, DB).");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over --verbose/--quiet when set.
fn init_logging(args: &Args) {
    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact();

    let result = match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish()),
        Err(_) => tracing::subscriber::set_global_default(
            builder.with_max_level(args.log_level()).finish(),
        ),
    };

    if let Err(e) = result {
        eprintln!("⚠️  Logging disabled: {}", e);
    }
}

/// Build everything, then answer one question or run the prompt loop.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let backend = build_backend(&config.model).context("Failed to set up the chat backend")?;

    if !args.quiet {
        println!("🤖 catalog-agent");
        println!("   Backend: {} ({})", backend.name(), config.model.url);
        println!("   Model: {}", config.model.name);
        println!("   Cache: {}", config.cache.path.display());
    }

    let mut agent = ProductAgent::new(&config, backend);

    if let Some(ref query) = args.query {
        let answered = answer(&mut agent, query, args.quiet).await;
        return Ok(if answered { 0 } else { 1 });
    }

    run_prompt(&mut agent, args.quiet).await?;
    Ok(0)
}

/// Read questions from stdin until `exit`, `quit` or end of input.
async fn run_prompt(agent: &mut ProductAgent<'_>, quiet: bool) -> Result<()> {
    if !quiet {
        println!("\n💬 Ask about products. Type 'exit' to quit.\n");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to write prompt")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            println!();
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        // A failed turn is reported and the prompt continues
        answer(agent, query, quiet).await;
    }

    if !quiet {
        println!("👋 Bye");
    }
    Ok(())
}

/// Ask one question and print the outcome. Returns whether it succeeded.
async fn answer(agent: &mut ProductAgent<'_>, query: &str, quiet: bool) -> bool {
    let spinner = (!quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Thinking...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = agent.ask(query).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(text) => {
            println!("{}\n", text.trim());
            true
        }
        Err(e) => {
            warn!("Turn failed: {}", e);
            println!("❌ {}\n", e);
            false
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
