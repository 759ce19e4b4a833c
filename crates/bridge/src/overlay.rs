//! System prompt overlay management.
//!
//! Callers resend the full system prompt on every request. The backend
//! keeps it as a durable, read-only memory block instead, so the prompt
//! never enters the agent's transcript. The `OverlayManager` keeps that
//! block in sync with the caller's prompt:
//!
//! 1. Unchanged content (same hash, known block) costs no backend call.
//! 2. Changed content updates the known block.
//! 3. Unknown block: adopt the agent's existing overlay block by label,
//!    or create and attach a new one.
//! 4. If the backend refuses, the prompt is sent in-band once as a
//!    tagged user message.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use agentbridge_core::backend::{AgentBackend, BlockUpdate, NewBlock};
use agentbridge_core::error::BackendError;
use agentbridge_core::message::OutboundMessage;
use agentbridge_config::CacheConfig;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::overlay_store::{SessionOverlayState, SessionOverlayStore};
use crate::session_key::SessionKeyDeriver;

/// Label of the block that holds the overlay.
pub const OVERLAY_LABEL: &str = "proxy_system_overlay";

/// Metadata key recording which session created a block.
pub const OVERLAY_SESSION_METADATA: &str = "proxy_overlay_session";

/// Strip NUL bytes and normalize line endings to `\n`.
pub fn normalize_content(content: &str) -> String {
    content
        .replace('\0', "")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Hex-encoded sha256 of `content`.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// The in-band substitute for an overlay block.
pub fn fallback_message(content: &str) -> OutboundMessage {
    OutboundMessage::user(format!("[Proxy System Overlay]: {content}"))
}

/// Result of one `apply_overlay` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayOutcome {
    /// A backend block now holds new content
    pub changed: bool,

    /// Messages to prepend to the outbound batch (at most one)
    pub fallback_messages: Vec<OutboundMessage>,
}

/// Read-only snapshot of one session, for the debug surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDebug {
    pub overlay_hash: Option<String>,
    pub block_id: Option<String>,
    pub fallback_applied: bool,
    pub age_secs: u64,
}

/// Read-only snapshot of all overlay caches.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayDebugDump {
    pub sessions: BTreeMap<String, SessionDebug>,
    pub derived_session_keys: BTreeMap<String, String>,
}

/// Keeps each agent's overlay block in sync with the caller's system prompt.
///
/// Callers must serialize `apply_overlay` per agent (see `KeyedLocks`).
pub struct OverlayManager {
    backend: Arc<dyn AgentBackend>,
    store: Mutex<SessionOverlayStore>,
    keys: SessionKeyDeriver,
}

impl OverlayManager {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        sessions: &CacheConfig,
        session_keys: &CacheConfig,
    ) -> Self {
        Self {
            backend,
            store: Mutex::new(SessionOverlayStore::new(sessions.max_entries, sessions.ttl())),
            keys: SessionKeyDeriver::new(session_keys.max_entries, session_keys.ttl()),
        }
    }

    /// See [`SessionKeyDeriver::derive`].
    pub fn derive_session_key(
        &self,
        agent_id: &str,
        system_content: Option<&str>,
        explicit_key: Option<&str>,
    ) -> String {
        self.keys.derive(agent_id, system_content, explicit_key)
    }

    /// Current state of a session, if live.
    pub fn state(&self, session_key: &str) -> Option<SessionOverlayState> {
        self.store().get(session_key)
    }

    fn store(&self) -> std::sync::MutexGuard<'_, SessionOverlayStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `content` as the overlay for `session_key` on `agent_id`.
    ///
    /// Never fails: backend errors turn into a single fallback message per
    /// content version.
    pub async fn apply_overlay(
        &self,
        agent_id: &str,
        session_key: &str,
        content: Option<&str>,
        project_id: Option<&str>,
    ) -> OverlayOutcome {
        let mut state = self.state(session_key).unwrap_or_default();
        let mut outcome = OverlayOutcome::default();

        let content = content.map(normalize_content).unwrap_or_default();
        if content.is_empty() {
            self.store().set(session_key, state);
            return outcome;
        }

        let hash = content_hash(&content);
        if state.is_current(&hash) {
            debug!(agent_id, session_key, "Overlay unchanged, skipping backend");
            self.store().set(session_key, state);
            return outcome;
        }

        // New content opens a new failure episode
        if state.overlay_hash.as_deref() != Some(hash.as_str()) {
            state.fallback_applied = false;
        }

        match self
            .reconcile(agent_id, session_key, &content, project_id, &state)
            .await
        {
            Ok(block_id) => {
                info!(agent_id, session_key, block_id = %block_id, "Overlay applied");
                state.block_id = Some(block_id);
                state.fallback_applied = false;
                outcome.changed = true;
            }
            Err(e) => {
                warn!(agent_id, session_key, error = %e, "Overlay update failed");
                if !state.fallback_applied {
                    warn!(agent_id, session_key, "Sending overlay in-band");
                    outcome.fallback_messages.push(fallback_message(&content));
                    state.fallback_applied = true;
                }
            }
        }

        // Recorded even on failure so unchanged content is not retried as new
        state.overlay_hash = Some(hash);
        self.store().set(session_key, state);
        outcome
    }

    /// Write `content` to the agent's overlay block, returning its handle.
    async fn reconcile(
        &self,
        agent_id: &str,
        session_key: &str,
        content: &str,
        project_id: Option<&str>,
        state: &SessionOverlayState,
    ) -> Result<String, BackendError> {
        let update = || BlockUpdate {
            label: OVERLAY_LABEL.into(),
            value: content.to_string(),
            project_id: project_id.map(String::from),
        };

        if let Some(block_id) = state.block() {
            debug!(agent_id, block_id, "Updating known overlay block");
            match self.backend.update_block(block_id, update()).await {
                Ok(_) => return Ok(block_id.to_string()),
                Err(BackendError::NotFound(_)) => {
                    warn!(agent_id, block_id, "Known overlay block is gone, rediscovering");
                }
                Err(e) => return Err(e),
            }
        }

        let existing = self
            .backend
            .list_agent_blocks(agent_id)
            .await?
            .into_iter()
            .find(|b| b.label.as_deref() == Some(OVERLAY_LABEL) && !b.id.is_empty());

        if let Some(block) = existing {
            info!(agent_id, block_id = %block.id, "Adopting existing overlay block");
            self.backend.update_block(&block.id, update()).await?;
            return Ok(block.id);
        }

        let limit = content.chars().count();
        info!(agent_id, session_key, limit, "Creating overlay block");
        debug!(preview = %content.chars().take(200).collect::<String>(), "Overlay content");

        let block = self
            .backend
            .create_block(NewBlock {
                label: OVERLAY_LABEL.into(),
                value: content.to_string(),
                metadata: serde_json::json!({ OVERLAY_SESSION_METADATA: session_key }),
                project_id: project_id.map(String::from),
                limit,
                read_only: true,
            })
            .await?;

        if block.id.is_empty() {
            return Err(BackendError::MissingHandle("created overlay block".into()));
        }

        self.backend.attach_block(agent_id, &block.id).await?;
        Ok(block.id)
    }

    /// Snapshot of live sessions and derived keys.
    pub fn debug_dump(&self) -> OverlayDebugDump {
        let now = Instant::now();
        let sessions = self
            .store()
            .items()
            .into_iter()
            .map(|(key, state)| {
                let debug = SessionDebug {
                    age_secs: now.duration_since(state.last_updated).as_secs(),
                    overlay_hash: state.overlay_hash,
                    block_id: state.block_id,
                    fallback_applied: state.fallback_applied,
                };
                (key, debug)
            })
            .collect();

        OverlayDebugDump {
            sessions,
            derived_session_keys: self.keys.entries().into_iter().collect(),
        }
    }
}
