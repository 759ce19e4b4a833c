//! Tool types: caller-side schemas and backend-side proxy registrations.
//!
//! Callers describe tools with OpenAI function schemas. The backend only
//! knows tools it has registered itself, so each caller tool is mirrored by
//! a "proxy tool" stub whose sole behaviour is to echo its arguments back.

use serde::{Deserialize, Serialize};

/// An OpenAI-style tool definition as sent by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Always "function" in practice
    #[serde(default = "default_tool_type", rename = "type")]
    pub kind: String,

    pub function: FunctionSchema,
}

fn default_tool_type() -> String {
    "function".into()
}

/// The function part of a tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// The tool name as the caller knows it
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema describing the tool's parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl ToolSchema {
    /// Convenience constructor used heavily in tests.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: default_tool_type(),
            function: FunctionSchema {
                name: name.into(),
                description: Some(description.into()),
                parameters: Some(parameters),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// A tool result supplied out-of-band in the request's `tool_results` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultInput {
    #[serde(default)]
    pub tool_call_id: Option<String>,

    /// Arbitrary payload; forwarded JSON-encoded
    #[serde(default = "empty_result")]
    pub result: serde_json::Value,
}

fn empty_result() -> serde_json::Value {
    serde_json::Value::String(String::new())
}

/// A tool as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTool {
    pub id: String,
    pub name: String,
}

/// The coarse type of a stub parameter, derived from JSON Schema `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    /// Map a JSON Schema type name; unknown or missing types become strings.
    pub fn from_json_type(json_type: Option<&str>) -> Self {
        match json_type {
            Some("number") | Some("integer") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            _ => Self::String,
        }
    }
}

/// One parameter in a proxy stub's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubParameter {
    pub name: String,
    pub kind: ParamKind,
}

/// Everything the backend needs to register a proxy tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyToolStub {
    /// Name registered on the backend (carries the reserved prefix)
    pub registered_name: String,

    /// Name the caller uses
    pub caller_name: String,

    pub description: String,

    /// Parameters in schema order
    pub parameters: Vec<StubParameter>,

    /// Names of required parameters
    pub required: Vec<String>,

    /// The caller's function schema, renamed to `registered_name`
    pub json_schema: serde_json::Value,
}
