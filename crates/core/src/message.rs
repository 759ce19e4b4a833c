//! Message domain types.
//!
//! Two families of messages flow through the gateway:
//! - `ChatMessage`: what a caller sends in an OpenAI-style transcript
//! - `OutboundMessage`: what we actually forward to the agent backend

use serde::{Deserialize, Serialize};

/// The role of a message sender in a caller transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
    /// Any role we do not interpret (e.g. "developer", "function")
    #[serde(other)]
    Other,
}

/// Message content as callers send it: a plain string or an array of parts.
///
/// Parts are kept as raw JSON because clients disagree on their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

impl MessageContent {
    /// Flatten the content into a single string.
    ///
    /// Text parts (`{"type":"text","text":…}`), parts carrying a string
    /// `content` field, and bare strings are concatenated in order; anything
    /// else (images, audio) is dropped.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    serde_json::Value::String(s) => Some(s.as_str()),
                    serde_json::Value::Object(obj) => {
                        if obj.get("type").and_then(|t| t.as_str()) == Some("text") {
                            obj.get("text").and_then(|t| t.as_str())
                        } else {
                            obj.get("content").and_then(|c| c.as_str())
                        }
                    }
                    _ => None,
                })
                .collect(),
        }
    }
}

/// A single message in a caller's OpenAI-style transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub role: Role,

    /// The content (may be absent on assistant tool-call turns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    /// Tool calls requested by the assistant (opaque, never forwarded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Optional participant name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// The content flattened to text; empty when absent.
    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(MessageContent::to_text)
            .unwrap_or_default()
    }
}

/// The role of a message forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundRole {
    User,
    Tool,
}

/// A message in the batch forwarded to the agent backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub role: OutboundRole,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl OutboundMessage {
    /// Create an outbound user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: OutboundRole::User,
            text: text.into(),
            tool_call_id: None,
        }
    }

    /// Create an outbound tool result, tagged with its tool-call id.
    pub fn tool_result(tool_call_id: Option<String>, text: impl Into<String>) -> Self {
        Self {
            role: OutboundRole::Tool,
            text: text.into(),
            tool_call_id,
        }
    }
}
