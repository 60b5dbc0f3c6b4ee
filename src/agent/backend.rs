//! Chat backends.
//!
//! [`ChatBackend`] is the seam between the orchestrator and a concrete LLM
//! API. Two dialects are provided: Ollama's `/api/chat` and the
//! OpenAI-compatible `/chat/completions`. Both are non-streaming.

use crate::agent::tools::ToolDefinition;
use crate::config::{ModelConfig, Provider};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Call id, echoed back with the result. Synthesized when the API has none.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One message of the conversation, independent of any wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// The model's answer to one chat request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[cfg(test)]
impl ChatReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the conversation plus the tool registry and return the reply.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatReply, BackendError>;

    fn name(&self) -> &str;
}

/// Build the backend selected by `config.provider`.
pub fn build_backend(config: &ModelConfig) -> Result<Box<dyn ChatBackend>, BackendError> {
    match config.provider {
        Provider::Ollama => Ok(Box::new(OllamaBackend::new(config)?)),
        Provider::Openai => Ok(Box::new(OpenAiBackend::new(config)?)),
    }
}

fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| BackendError::Request(e.to_string()))
}

fn map_send_error(e: reqwest::Error, url: &str, timeout_seconds: u64) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout {
            seconds: timeout_seconds,
        }
    } else if e.is_connect() {
        BackendError::Connect {
            url: url.to_string(),
        }
    } else {
        BackendError::Request(e.to_string())
    }
}

async fn post_json<T: Serialize + ?Sized>(
    request: reqwest::RequestBuilder,
    body: &T,
    url: &str,
    timeout_seconds: u64,
) -> Result<String, BackendError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| map_send_error(e, url, timeout_seconds))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| map_send_error(e, url, timeout_seconds))?;

    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(text)
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

/// Ollama `/api/chat` backend.
pub struct OllamaBackend {
    http: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl OllamaBackend {
    pub fn new(config: &ModelConfig) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(config.timeout_seconds)?,
            url: format!("{}/api/chat", config.url.trim_end_matches('/')),
            model: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn to_wire(messages: &[ChatMessage]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role,
                content: m.content.clone(),
                tool_calls: (!m.tool_calls.is_empty()).then(|| {
                    m.tool_calls
                        .iter()
                        .map(|c| OllamaToolCall {
                            function: OllamaFunction {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect()
                }),
            })
            .collect()
    }

    fn parse_reply(body: &str) -> Result<ChatReply, BackendError> {
        let response: OllamaChatResponse = serde_json::from_str(body)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let tool_calls = response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, c)| ToolCall {
                id: format!("call_{}", i),
                name: c.function.name,
                arguments: normalize_arguments(c.function.arguments),
            })
            .collect();

        Ok(ChatReply {
            content: response.message.content,
            tool_calls,
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatReply, BackendError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages: Self::to_wire(messages),
            tools,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!("Sending Ollama chat request with {} messages", messages.len());
        let body = post_json(
            self.http.post(&self.url),
            &request,
            &self.url,
            self.timeout_seconds,
        )
        .await?;

        Self::parse_reply(&body)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAiFunction,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunction {
    name: String,
    /// JSON-encoded argument object.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

/// OpenAI-compatible `/chat/completions` backend.
pub struct OpenAiBackend {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl OpenAiBackend {
    pub fn new(config: &ModelConfig) -> Result<Self, BackendError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| BackendError::Request("OPENAI_API_KEY is not set".to_string()))?;

        Ok(Self {
            http: http_client(config.timeout_seconds)?,
            url: format!("{}/chat/completions", config.url.trim_end_matches('/')),
            api_key,
            model: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn to_wire(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role,
                content: if m.content.is_empty() && !m.tool_calls.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                },
                tool_calls: (!m.tool_calls.is_empty()).then(|| {
                    m.tool_calls
                        .iter()
                        .map(|c| OpenAiToolCall {
                            id: c.id.clone(),
                            call_type: function_type(),
                            function: OpenAiFunction {
                                name: c.name.clone(),
                                arguments: c.arguments.to_string(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn parse_reply(body: &str) -> Result<ChatReply, BackendError> {
        let response: OpenAiChatResponse = serde_json::from_str(body)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("response has no choices".to_string()))?
            .message;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                let raw = c.function.arguments.trim();
                let arguments = if raw.is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(raw).map_err(|e| {
                        BackendError::InvalidResponse(format!(
                            "arguments for {} are not JSON: {}",
                            c.function.name, e
                        ))
                    })?
                };
                Ok(ToolCall {
                    id: c.id,
                    name: c.function.name,
                    arguments,
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        Ok(ChatReply {
            content: message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatReply, BackendError> {
        let request = OpenAiChatRequest {
            model: &self.model,
            messages: Self::to_wire(messages),
            tools,
            temperature: self.temperature,
        };

        debug!("Sending chat completion with {} messages", messages.len());
        let body = post_json(
            self.http.post(&self.url).bearer_auth(&self.api_key),
            &request,
            &self.url,
            self.timeout_seconds,
        )
        .await?;

        Self::parse_reply(&body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Some models send arguments as a JSON string or `null`; always hand the
/// tools an object.
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::Null => Value::Object(Default::default()),
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}
