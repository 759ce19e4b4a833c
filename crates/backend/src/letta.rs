//! Letta REST client.
//!
//! Implements `AgentBackend` against a Letta server (self-hosted or cloud):
//! - Agent listing
//! - Tool listing, upsert, attach and detach
//! - Core-memory block listing, creation, update and attach
//! - Message exchange (non-streaming and streaming SSE)

use agentbridge_config::BackendConfig;
use agentbridge_core::backend::*;
use agentbridge_core::error::BackendError;
use agentbridge_core::message::{OutboundMessage, OutboundRole};
use agentbridge_core::tool::{BackendTool, ProxyToolStub};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::stub;

/// An HTTP client for a Letta agent server.
pub struct LettaClient {
    base_url: String,
    api_key: Option<String>,
    project: Option<String>,
    client: reqwest::Client,
}

impl LettaClient {
    /// Create a new client.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        project: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            project,
            client,
        })
    }

    /// Create a client from the `[backend]` config section.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.project.clone(),
            std::time::Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach auth and project headers.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        if let Some(project) = &self.project {
            builder = builder.header("X-Project", project);
        }
        builder
    }

    /// Send a request and map transport and status failures.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, BackendError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(BackendError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(BackendError::NotFound(what.to_string()));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, call = what, body = %error_body, "Backend returned error");
            return Err(BackendError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    async fn json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, BackendError> {
        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("{what}: {e}")))
    }

    /// Convert outbound messages to the Letta `MessageCreate` shape.
    fn to_api_messages(messages: &[OutboundMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    OutboundRole::User => "user".into(),
                    OutboundRole::Tool => "tool".into(),
                },
                content: vec![ApiTextContent {
                    r#type: "text".into(),
                    text: m.text.clone(),
                }],
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl AgentBackend for LettaClient {
    fn name(&self) -> &str {
        "letta"
    }

    async fn list_agents(&self) -> Result<Vec<AgentInfo>, BackendError> {
        let response = self
            .send(self.request(reqwest::Method::GET, "/v1/agents/"), "list agents")
            .await?;
        let agents: Vec<ApiAgent> = Self::json(response, "list agents").await?;

        Ok(agents
            .into_iter()
            .map(|a| AgentInfo {
                id: a.id,
                name: a.name,
                project_id: a.project_id,
            })
            .collect())
    }

    async fn list_agent_tools(&self, agent_id: &str) -> Result<Vec<BackendTool>, BackendError> {
        let path = format!("/v1/agents/{agent_id}/tools");
        let response = self
            .send(self.request(reqwest::Method::GET, &path), "list agent tools")
            .await?;
        let tools: Vec<ApiTool> = Self::json(response, "list agent tools").await?;

        Ok(tools
            .into_iter()
            .filter_map(|t| match (t.id, t.name) {
                (Some(id), Some(name)) => Some(BackendTool { id, name }),
                _ => None,
            })
            .collect())
    }

    async fn register_tool(&self, stub: &ProxyToolStub) -> Result<BackendTool, BackendError> {
        let body = serde_json::json!({
            "source_code": stub::render_source(stub),
            "description": stub.description,
            "json_schema": stub.json_schema,
        });

        debug!(tool = %stub.registered_name, "Upserting proxy tool");

        let response = self
            .send(
                self.request(reqwest::Method::PUT, "/v1/tools/").json(&body),
                "upsert tool",
            )
            .await?;
        let tool: ApiTool = Self::json(response, "upsert tool").await?;

        match tool.id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(BackendTool {
                id,
                name: tool.name.unwrap_or_else(|| stub.registered_name.clone()),
            }),
            None => Err(BackendError::MissingHandle(format!(
                "tool {}",
                stub.registered_name
            ))),
        }
    }

    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), BackendError> {
        let path = format!("/v1/agents/{agent_id}/tools/attach/{tool_id}");
        self.send(self.request(reqwest::Method::PATCH, &path), "attach tool")
            .await?;
        Ok(())
    }

    async fn detach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), BackendError> {
        let path = format!("/v1/agents/{agent_id}/tools/detach/{tool_id}");
        self.send(self.request(reqwest::Method::PATCH, &path), "detach tool")
            .await?;
        Ok(())
    }

    async fn list_agent_blocks(&self, agent_id: &str) -> Result<Vec<Block>, BackendError> {
        let path = format!("/v1/agents/{agent_id}/core-memory/blocks");
        let response = self
            .send(self.request(reqwest::Method::GET, &path), "list agent blocks")
            .await?;
        Self::json(response, "list agent blocks").await
    }

    async fn create_block(&self, block: NewBlock) -> Result<Block, BackendError> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/v1/blocks/").json(&block),
                "create block",
            )
            .await?;
        Self::json(response, "create block").await
    }

    async fn update_block(
        &self,
        block_id: &str,
        update: BlockUpdate,
    ) -> Result<Block, BackendError> {
        let path = format!("/v1/blocks/{block_id}");
        let response = self
            .send(
                self.request(reqwest::Method::PATCH, &path).json(&update),
                "update block",
            )
            .await?;
        Self::json(response, "update block").await
    }

    async fn attach_block(&self, agent_id: &str, block_id: &str) -> Result<(), BackendError> {
        let path = format!("/v1/agents/{agent_id}/core-memory/blocks/attach/{block_id}");
        self.send(self.request(reqwest::Method::PATCH, &path), "attach block")
            .await?;
        Ok(())
    }

    async fn send_messages(
        &self,
        agent_id: &str,
        messages: Vec<OutboundMessage>,
    ) -> Result<AgentResponse, BackendError> {
        let path = format!("/v1/agents/{agent_id}/messages");
        let body = serde_json::json!({
            "messages": Self::to_api_messages(&messages),
        });

        debug!(agent_id, count = messages.len(), "Sending messages");

        let response = self
            .send(
                self.request(reqwest::Method::POST, &path).json(&body),
                "create messages",
            )
            .await?;
        let api_response: ApiMessagesResponse = Self::json(response, "create messages").await?;

        let mut events: Vec<AgentEvent> = api_response
            .messages
            .into_iter()
            .filter_map(LettaMessage::into_event)
            .collect();

        if let Some(reason) = api_response.stop_reason.and_then(|s| s.stop_reason) {
            events.push(AgentEvent::StopReason { reason });
        }

        Ok(AgentResponse {
            events,
            usage: api_response.usage.map(ApiUsage::into_usage),
        })
    }

    async fn stream_messages(
        &self,
        agent_id: &str,
        messages: Vec<OutboundMessage>,
    ) -> Result<EventStream, BackendError> {
        let path = format!("/v1/agents/{agent_id}/messages/stream");
        let body = serde_json::json!({
            "messages": Self::to_api_messages(&messages),
            "stream_tokens": true,
        });

        debug!(agent_id, count = messages.len(), "Sending streaming request");

        let response = self
            .send(
                self.request(reqwest::Method::POST, &path)
                    .header("Accept", "text/event-stream")
                    .json(&body),
                "stream messages",
            )
            .await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Spawn task to read the SSE byte stream and parse events
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(BackendError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for frame in decoder.push(&bytes) {
                    match frame {
                        SseFrame::Done => return,
                        SseFrame::Event(event) => {
                            if tx.send(Ok(event)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseFrame::Error(message) => {
                            let _ = tx.send(Err(BackendError::StreamInterrupted(message))).await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

// --- SSE decoding ---

/// A decoded SSE `data:` payload.
#[derive(Debug, PartialEq)]
enum SseFrame {
    Event(AgentEvent),
    Done,
    Error(String),
}

/// Incremental line decoder for the Letta event stream.
#[derive(Default)]
struct SseDecoder {
    /// Bytes of the unfinished trailing line
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes, returning every frame completed by them.
    fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        // Decode whole lines only; a multi-byte character may span chunks
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            // Skip empty lines, comments and `event:` names
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                frames.push(SseFrame::Done);
                continue;
            }

            match serde_json::from_str::<LettaMessage>(data) {
                Ok(LettaMessage::Error { message, detail }) => {
                    frames.push(SseFrame::Error(
                        message.or(detail).unwrap_or_else(|| "unknown error".into()),
                    ));
                }
                Ok(message) => {
                    if let Some(event) = message.into_event() {
                        frames.push(SseFrame::Event(event));
                    }
                }
                Err(e) => {
                    trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                }
            }
        }
        frames
    }
}

// --- Letta API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: Vec<ApiTextContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiTextContent {
    r#type: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiAgent {
    id: String,
    name: String,
    #[serde(default)]
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTool {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessagesResponse {
    #[serde(default)]
    messages: Vec<LettaMessage>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    stop_reason: Option<ApiStopReason>,
}

#[derive(Debug, Deserialize)]
struct ApiStopReason {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl ApiUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
    #[serde(default)]
    tool_call_id: Option<String>,
}

/// One message in a Letta response or stream, discriminated by `message_type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
enum LettaMessage {
    AssistantMessage {
        #[serde(default)]
        content: serde_json::Value,
    },
    ReasoningMessage {
        #[serde(default)]
        reasoning: Option<String>,
    },
    ToolCallMessage {
        tool_call: ApiToolCall,
    },
    ToolReturnMessage {
        #[serde(default)]
        tool_return: serde_json::Value,
        #[serde(default)]
        tool_call_id: Option<String>,
    },
    StopReason {
        #[serde(default)]
        stop_reason: Option<String>,
    },
    UsageStatistics {
        #[serde(default)]
        prompt_tokens: u32,
        #[serde(default)]
        completion_tokens: u32,
        #[serde(default)]
        total_tokens: u32,
    },
    #[serde(rename = "error_message")]
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        detail: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl LettaMessage {
    fn into_event(self) -> Option<AgentEvent> {
        match self {
            Self::AssistantMessage { content } => Some(AgentEvent::AssistantText {
                text: content_text(&content),
            }),
            Self::ReasoningMessage { reasoning } => Some(AgentEvent::Reasoning {
                text: reasoning.unwrap_or_default(),
            }),
            Self::ToolCallMessage { tool_call } => Some(AgentEvent::ToolCall {
                id: tool_call.tool_call_id.unwrap_or_default(),
                name: tool_call.name.unwrap_or_default(),
                arguments: tool_call.arguments.unwrap_or_default(),
            }),
            Self::ToolReturnMessage {
                tool_return,
                tool_call_id,
            } => Some(AgentEvent::ToolReturn {
                tool_call_id,
                output: content_text(&tool_return),
            }),
            Self::StopReason { stop_reason } => {
                stop_reason.map(|reason| AgentEvent::StopReason { reason })
            }
            Self::UsageStatistics {
                prompt_tokens,
                completion_tokens,
                total_tokens,
            } => Some(AgentEvent::Usage(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
            })),
            Self::Error { .. } | Self::Unknown => None,
        }
    }
}

/// Flatten Letta content (a string or a list of `{type: "text", text}` parts).
fn content_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
