//! AgentBackend trait: the narrow surface of the stateful agent platform.
//!
//! The gateway never reasons, remembers, or executes tools itself. It only
//! looks agents up, keeps their tool attachments and overlay memory block in
//! sync, and exchanges messages. Everything else is opaque.
//!
//! Implementations: `LettaClient` (HTTP), plus recording mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::message::OutboundMessage;
use crate::tool::{BackendTool, ProxyToolStub};

/// An agent known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// A durable memory block on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Maximum size of `value` in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default)]
    pub read_only: bool,
}

/// Parameters for creating a memory block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBlock {
    pub label: String,
    pub value: String,
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub limit: usize,
    pub read_only: bool,
}

/// Parameters for updating a memory block's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockUpdate {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A typed event produced by a message exchange with an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Text the agent addressed to the user.
    AssistantText { text: String },

    /// Internal reasoning / thinking text.
    Reasoning { text: String },

    /// The agent invoked a tool.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    /// A tool invocation returned (server-side execution).
    ToolReturn {
        tool_call_id: Option<String>,
        output: String,
    },

    /// Why the agent stopped.
    StopReason { reason: String },

    /// Token accounting for the exchange.
    Usage(Usage),
}

impl AgentEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssistantText { .. } => "assistant_text",
            Self::Reasoning { .. } => "reasoning",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolReturn { .. } => "tool_return",
            Self::StopReason { .. } => "stop_reason",
            Self::Usage(_) => "usage",
        }
    }
}

/// The complete (non-streaming) result of a message exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub events: Vec<AgentEvent>,
    pub usage: Option<Usage>,
}

/// Receiver half of a streamed message exchange.
pub type EventStream = tokio::sync::mpsc::Receiver<Result<AgentEvent, BackendError>>;

/// The core AgentBackend trait.
///
/// Every method is a single backend round-trip and reports failure as a
/// typed `BackendError`; callers decide whether a failure is fatal.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// A human-readable name for this backend (e.g. "letta").
    fn name(&self) -> &str;

    /// List all agents.
    async fn list_agents(&self) -> Result<Vec<AgentInfo>, BackendError>;

    /// List the tools currently attached to an agent.
    async fn list_agent_tools(&self, agent_id: &str) -> Result<Vec<BackendTool>, BackendError>;

    /// Register (or re-register) a proxy tool, returning the backend's handle.
    async fn register_tool(&self, stub: &ProxyToolStub) -> Result<BackendTool, BackendError>;

    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), BackendError>;

    async fn detach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), BackendError>;

    /// List the memory blocks attached to an agent.
    async fn list_agent_blocks(&self, agent_id: &str) -> Result<Vec<Block>, BackendError>;

    async fn create_block(&self, block: NewBlock) -> Result<Block, BackendError>;

    async fn update_block(&self, block_id: &str, update: BlockUpdate)
    -> Result<Block, BackendError>;

    async fn attach_block(&self, agent_id: &str, block_id: &str) -> Result<(), BackendError>;

    /// Send a batch of messages and wait for the complete response.
    async fn send_messages(
        &self,
        agent_id: &str,
        messages: Vec<OutboundMessage>,
    ) -> Result<AgentResponse, BackendError>;

    /// Send a batch of messages and receive events as they are produced.
    ///
    /// Default implementation calls `send_messages()` and replays the result.
    async fn stream_messages(
        &self,
        agent_id: &str,
        messages: Vec<OutboundMessage>,
    ) -> Result<EventStream, BackendError> {
        let response = self.send_messages(agent_id, messages).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(response.events.len().max(1) + 1);
        for event in response.events {
            let _ = tx.send(Ok(event)).await;
        }
        if let Some(usage) = response.usage {
            let _ = tx.send(Ok(AgentEvent::Usage(usage))).await;
        }
        Ok(rx)
    }

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> Result<bool, BackendError> {
        self.list_agents().await.map(|_| true)
    }
}
