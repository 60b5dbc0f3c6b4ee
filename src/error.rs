//! Error types shared across the catalog tools and the agent.

use thiserror::Error;

/// Errors from the remote catalog API.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog API rejected the credential (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("catalog API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode catalog page {page}: {message}")]
    Decode { page: u32, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("catalog API is not configured: {0} is missing")]
    NotConfigured(&'static str),
}

/// Errors from the local JSON cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("product cache not found at {0}; refresh the catalog first")]
    Missing(String),

    #[error("product cache at {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while validating or executing a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool requested: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} is not configured: {1}")]
    NotConfigured(&'static str, String),

    #[error("no products match {0}")]
    NoMatches(String),

    #[error("failed to serialize tool output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from an LLM backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("LLM request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("cannot connect to LLM at {url}")]
    Connect { url: String },

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("LLM request failed: {0}")]
    Request(String),
}

/// Errors that end a single query turn.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("model did not produce an answer within {0} tool rounds")]
    RoundLimit(usize),
}
