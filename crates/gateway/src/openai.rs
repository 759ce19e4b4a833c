//! OpenAI chat-completions wire types and the translation from agent events.
//!
//! Field names follow the OpenAI API; optional delta fields are omitted
//! rather than sent as `null` so strict clients stay happy.

use agentbridge_core::backend::{AgentEvent, AgentResponse, Usage};
use agentbridge_core::message::ChatMessage;
use agentbridge_core::tool::{ToolResultInput, ToolSchema};
use serde::{Deserialize, Serialize};

// ── Requests ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default)]
    pub stream: bool,

    #[serde(default)]
    pub tools: Option<Vec<ToolSchema>>,

    /// Tool results supplied out of band instead of as `tool` messages
    #[serde(default)]
    pub tool_results: Option<Vec<ToolResultInput>>,
}

// ── Non-streaming responses ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: UsageDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDto>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDto {
    pub index: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCallDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallDto {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDto {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<Usage> for UsageDto {
    fn from(u: Usage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// ── Streaming chunks ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDto>>,
}

/// In-band error frame sent when a stream fails after it started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamError {
    pub id: String,
    pub object: String,
    pub error: ErrorBody,
}

// ── Errors and models ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl ModelList {
    pub fn from_names(names: Vec<String>) -> Self {
        let created = now_unix();
        Self {
            object: "list".into(),
            data: names
                .into_iter()
                .map(|id| ModelCard {
                    id,
                    object: "model".into(),
                    created,
                    owned_by: "letta".into(),
                })
                .collect(),
        }
    }
}

// ── Translation ───────────────────────────────────────────────────────────

pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Map a backend stop reason onto an OpenAI `finish_reason`.
pub fn map_stop_reason(reason: &str) -> String {
    match reason {
        "end_turn" | "stop" => "stop".into(),
        r if r.contains("tool") => "tool_calls".into(),
        "max_steps" | "max_tokens" | "length" => "length".into(),
        other => other.into(),
    }
}

fn tool_call(index: u32, id: &str, name: String, arguments: &str) -> ToolCallDto {
    ToolCallDto {
        index,
        id: id.to_string(),
        kind: "function".into(),
        function: FunctionCallDto {
            name,
            arguments: arguments.to_string(),
        },
    }
}

impl ChatCompletion {
    /// A completion with an empty assistant message and zero usage.
    pub fn empty(model: &str) -> Self {
        Self::with_message(
            model,
            ResponseMessage {
                role: "assistant".into(),
                content: String::new(),
                tool_calls: None,
            },
            "stop",
            UsageDto::default(),
        )
    }

    fn with_message(
        model: &str,
        message: ResponseMessage,
        finish_reason: &str,
        usage: UsageDto,
    ) -> Self {
        Self {
            id: completion_id(),
            object: "chat.completion".into(),
            created: now_unix(),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: finish_reason.into(),
            }],
            usage,
        }
    }

    /// Translate a complete agent exchange.
    ///
    /// Tool calls are only surfaced when the agent did nothing else this
    /// turn; otherwise the text (plus the first reasoning) is returned.
    /// `rename` maps backend tool names back to the caller's names.
    pub fn from_agent_response(
        model: &str,
        response: &AgentResponse,
        rename: impl Fn(&str) -> String,
    ) -> Self {
        let mut texts: Vec<&str> = Vec::new();
        let mut reasoning: Option<&str> = None;
        let mut calls = Vec::new();
        let mut returns = 0usize;

        for event in &response.events {
            match event {
                AgentEvent::AssistantText { text } => texts.push(text.as_str()),
                AgentEvent::Reasoning { text } if reasoning.is_none() && !text.is_empty() => {
                    reasoning = Some(text.as_str());
                }
                AgentEvent::ToolCall {
                    id,
                    name,
                    arguments,
                } => calls.push((id, name, arguments)),
                AgentEvent::ToolReturn { .. } => returns += 1,
                _ => {}
            }
        }

        let usage = response.usage.map(UsageDto::from).unwrap_or_default();

        if !calls.is_empty() && texts.is_empty() && returns == 0 {
            let tool_calls = calls
                .into_iter()
                .enumerate()
                .map(|(i, (id, name, args))| tool_call(i as u32, id, rename(name.as_str()), args))
                .collect();
            let message = ResponseMessage {
                role: "assistant".into(),
                content: String::new(),
                tool_calls: Some(tool_calls),
            };
            return Self::with_message(model, message, "tool_calls", usage);
        }

        let combined = texts
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let content = match reasoning {
            Some(r) if combined.is_empty() => r.to_string(),
            Some(r) => format!("{combined}\n\n[Reasoning: {r}]"),
            None => combined,
        };

        let message = ResponseMessage {
            role: "assistant".into(),
            content,
            tool_calls: None,
        };
        Self::with_message(model, message, "stop", usage)
    }
}

impl ChatCompletionChunk {
    fn new(id: &str, model: &str, delta: Delta, finish_reason: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".into(),
            created: now_unix(),
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }

    /// The opening chunk announcing the assistant role.
    pub fn primer(id: &str, model: &str) -> Self {
        let delta = Delta {
            role: Some("assistant".into()),
            ..Delta::default()
        };
        Self::new(id, model, delta, None)
    }

    /// Translate one streamed event; events callers never see yield `None`.
    pub fn from_event(
        id: &str,
        model: &str,
        event: &AgentEvent,
        rename: impl Fn(&str) -> String,
    ) -> Option<Self> {
        let (delta, finish_reason) = match event {
            AgentEvent::Reasoning { text } => (
                Delta {
                    reasoning: Some(text.clone()),
                    ..Delta::default()
                },
                None,
            ),
            AgentEvent::AssistantText { text } => (
                Delta {
                    content: Some(text.clone()),
                    ..Delta::default()
                },
                None,
            ),
            AgentEvent::ToolCall {
                id: call_id,
                name,
                arguments,
            } => (
                Delta {
                    tool_calls: Some(vec![tool_call(0, call_id, rename(name.as_str()), arguments)]),
                    ..Delta::default()
                },
                None,
            ),
            AgentEvent::StopReason { reason } => (Delta::default(), Some(map_stop_reason(reason))),
            AgentEvent::ToolReturn { .. } | AgentEvent::Usage(_) => return None,
        };
        Some(Self::new(id, model, delta, finish_reason))
    }
}

impl StreamError {
    pub fn new(id: &str, message: impl std::fmt::Display) -> Self {
        Self {
            id: id.to_string(),
            object: "error".into(),
            error: ErrorBody {
                message: format!("Streaming error: {message}"),
                kind: "streaming_error".into(),
            },
        }
    }
}
