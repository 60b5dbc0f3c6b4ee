//! Tool-dispatch loop that answers product questions.
//!
//! Each question starts a fresh conversation: system prompt, user message,
//! then rounds of model reply plus tool execution until the model answers in
//! plain text or the round limit is hit.

use crate::agent::backend::{ChatBackend, ChatMessage, Role};
use crate::agent::tools::{get_tool_definitions, ToolDefinition, ToolExecutor, ToolRequest};
use crate::config::{AgentSettings, Config};
use crate::error::AgentError;
use tracing::{debug, info, warn};

/// The product question agent.
pub struct ProductAgent<'a> {
    settings: AgentSettings,
    backend: Box<dyn ChatBackend>,
    executor: ToolExecutor<'a>,
    tools: Vec<ToolDefinition>,
    messages: Vec<ChatMessage>,
}

impl<'a> ProductAgent<'a> {
    pub fn new(config: &'a Config, backend: Box<dyn ChatBackend>) -> Self {
        info!(
            "Initializing agent with {} backend, model {}",
            backend.name(),
            config.model.name
        );

        Self {
            settings: config.agent.clone(),
            backend,
            executor: ToolExecutor::new(config),
            tools: get_tool_definitions(),
            messages: Vec::new(),
        }
    }

    /// Answer one question, calling tools as the model requests them.
    pub async fn ask(&mut self, query: &str) -> Result<String, AgentError> {
        self.messages.clear();
        self.messages.push(ChatMessage::system(SYSTEM_PROMPT));
        self.messages.push(ChatMessage::user(query));

        for round in 0..self.settings.max_tool_rounds {
            debug!(
                "Round {}: sending {} messages",
                round + 1,
                self.messages.len()
            );

            let reply = self.backend.chat(&self.messages, &self.tools).await?;

            if reply.tool_calls.is_empty() {
                info!("Answered after {} round(s)", round + 1);
                return Ok(reply.content);
            }

            self.messages
                .push(ChatMessage::assistant(reply.content, reply.tool_calls.clone()));

            for call in &reply.tool_calls {
                let request = ToolRequest::parse(call)
                    .inspect_err(|e| warn!("Rejected tool call {}: {}", call.name, e))?;

                let output = self
                    .executor
                    .execute(&request)
                    .await
                    .inspect_err(|e| warn!("Tool {} failed: {}", call.name, e))?;

                info!("Tool {} executed ({} bytes)", call.name, output.len());
                self.messages.push(ChatMessage::tool_result(&call.id, output));
            }

            self.prune_old_messages();
        }

        Err(AgentError::RoundLimit(self.settings.max_tool_rounds))
    }

    /// Drop the oldest completed rounds so at most `max_context_messages`
    /// follow the system prompt and user message.
    ///
    /// A round is removed whole (assistant message plus its tool results),
    /// and the latest round is never removed.
    fn prune_old_messages(&mut self) {
        let max_keep = self.settings.max_context_messages + 2;
        let keep_start = 2;
        let mut removed = 0;

        while self.messages.len() > max_keep {
            let mut end = keep_start + 1;
            while end < self.messages.len() && self.messages[end].role == Role::Tool {
                end += 1;
            }
            if end >= self.messages.len() {
                break;
            }
            self.messages.drain(keep_start..end);
            removed += end - keep_start;
        }

        if removed > 0 {
            debug!("Pruned {} old messages to save context", removed);
        }
    }
}

const SYSTEM_PROMPT: &str = r#"You are a helpful shopping assistant for an online store. You answer questions about the store's products using tools.

## Available Tools

- `list_titles_and_prices(query?, source?)` - Product titles and prices, filtered by title keywords
- `get_product_details(barcode?, query?)` - Full details for specific products
- `cache_status()` - How many products are cached and how fresh the cache is
- `refresh_catalog()` - Download the latest catalog from the supplier (slow)
- `sync_database()` - Copy the cached catalog into the products table

## Your Process

1. For questions about products or prices, call list_titles_and_prices with one or two short keywords from the question
2. If you need more than title and price, call get_product_details
3. Only call refresh_catalog when the user asks for fresh data or the cache is missing
4. Answer in the user's language, quoting exact titles and prices from tool results

Never invent products or prices that did not come from a tool result.
"#;
