//! Error types for the AgentBridge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Backend-call failures are a bounded context of their own so the
//! reconciliation layer can consume them as values instead of aborting.

use thiserror::Error;

/// The top-level error type for request-boundary failures.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Caller errors ---
    #[error("Unknown model: {model}. Available models: {available:?}")]
    UnknownModel {
        model: String,
        available: Vec<String>,
    },

    #[error("messages required")]
    MissingMessages,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller sent something we cannot serve (as opposed to a
    /// failure on our side or the backend's).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownModel { .. } | Self::MissingMessages)
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A failure talking to the agent backend (network, auth, validation).
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("Backend returned a resource without an id: {0}")]
    MissingHandle(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// A single tool that could not be reconciled during a registry sync.
#[derive(Debug, Clone, Error)]
#[error("Tool sync failed for {tool}: {reason}")]
pub struct ToolSyncFailure {
    pub tool: String,
    pub reason: String,
}
