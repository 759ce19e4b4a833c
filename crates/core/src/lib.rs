//! # AgentBridge Core
//!
//! Domain types, the agent-backend trait, and error definitions for the
//! AgentBridge gateway. This crate has **zero framework dependencies**; it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The backend is defined as a trait here. The HTTP client lives in
//! `agentbridge-backend`; the reconciliation logic in `agentbridge-bridge`
//! only ever talks to the trait. This enables:
//! - Swapping the backend client via configuration
//! - Easy testing with recording mock backends
//! - Clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use backend::{
    AgentBackend, AgentEvent, AgentInfo, AgentResponse, Block, BlockUpdate, EventStream, NewBlock,
    Usage,
};
pub use error::{BackendError, Error, Result, ToolSyncFailure};
pub use message::{ChatMessage, MessageContent, OutboundMessage, OutboundRole, Role};
pub use tool::{
    BackendTool, FunctionSchema, ParamKind, ProxyToolStub, StubParameter, ToolResultInput,
    ToolSchema,
};
