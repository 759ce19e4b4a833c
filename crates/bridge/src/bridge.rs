//! The `Bridge`: one object that prepares each turn for the backend.
//!
//! Built once at startup and shared by every request handler. Per request
//! it resolves the agent, applies the system prompt overlay, syncs proxy
//! tools and builds the outbound batch.

use std::sync::Arc;

use agentbridge_config::AppConfig;
use agentbridge_core::backend::{AgentBackend, AgentInfo};
use agentbridge_core::error::{Error, Result};
use agentbridge_core::message::ChatMessage;
use agentbridge_core::tool::{ToolResultInput, ToolSchema};
use tracing::{info, warn};

use crate::directory::AgentDirectory;
use crate::locks::KeyedLocks;
use crate::overlay::{OverlayDebugDump, OverlayManager};
use crate::reconcile::{self, OutboundBatch};
use crate::tools::{ToolSyncReport, ToolSynchronizer};

/// The parts of a chat request the bridge acts on.
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    /// `None` leaves the agent's proxy tools alone; `Some(&[])` removes them
    pub tools: Option<&'a [ToolSchema]>,
    pub tool_results: &'a [ToolResultInput],
}

/// Everything needed to forward one turn.
#[derive(Debug)]
pub struct PreparedTurn {
    pub agent: AgentInfo,
    pub session_key: String,
    pub overlay_changed: bool,
    pub tool_sync: Option<ToolSyncReport>,
    pub batch: OutboundBatch,
}

pub struct Bridge {
    backend: Arc<dyn AgentBackend>,
    directory: AgentDirectory,
    overlays: OverlayManager,
    tools: ToolSynchronizer,
    locks: KeyedLocks,
}

impl Bridge {
    pub fn new(backend: Arc<dyn AgentBackend>, config: &AppConfig) -> Self {
        if config.caches_diverge() {
            warn!(
                sessions = ?config.sessions,
                session_keys = ?config.session_keys,
                "Session and session-key caches are configured differently"
            );
        }

        Self {
            directory: AgentDirectory::new(backend.clone()),
            overlays: OverlayManager::new(backend.clone(), &config.sessions, &config.session_keys),
            tools: ToolSynchronizer::new(backend.clone(), config.tools.prefix.clone()),
            locks: KeyedLocks::new(),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn AgentBackend> {
        &self.backend
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn tools(&self) -> &ToolSynchronizer {
        &self.tools
    }

    /// Load the agent directory; failure is logged, not fatal.
    pub async fn warm_up(&self) {
        if let Err(e) = self.directory.refresh().await {
            warn!(error = %e, "Could not reach backend on startup; agents load on first request");
        }
    }

    /// Resolve the agent, reconcile overlay and tools, and build the batch.
    pub async fn prepare_turn(
        &self,
        request: TurnRequest<'_>,
        explicit_session_key: Option<&str>,
    ) -> Result<PreparedTurn> {
        let agent = self.directory.resolve(request.model).await?;
        if request.messages.is_empty() {
            return Err(Error::MissingMessages);
        }

        let system_content = reconcile::collect_system_content(request.messages);
        let session_key = self.overlays.derive_session_key(
            &agent.id,
            system_content.as_deref(),
            explicit_session_key,
        );

        let (overlay, tool_sync) = {
            let _guard = self.locks.lock(&agent.id).await;

            let overlay = self
                .overlays
                .apply_overlay(
                    &agent.id,
                    &session_key,
                    system_content.as_deref(),
                    agent.project_id.as_deref(),
                )
                .await;

            let tool_sync = match request.tools {
                Some(tools) => match self.tools.sync(&agent.id, tools).await {
                    Ok(report) => {
                        for failure in &report.failed {
                            warn!(agent_id = %agent.id, %failure, "Proxy tool not synced");
                        }
                        Some(report)
                    }
                    Err(e) => {
                        warn!(agent_id = %agent.id, error = %e, "Tool sync skipped");
                        None
                    }
                },
                None => None,
            };

            (overlay, tool_sync)
        };

        let trailing = reconcile::trailing_tool_messages(request.messages);
        let batch = reconcile::build_batch(
            overlay.fallback_messages,
            request.tool_results,
            &trailing,
            request.messages,
        );

        info!(
            model = request.model,
            agent_id = %agent.id,
            session_key = %session_key,
            overlay_changed = overlay.changed,
            outbound = batch.len(),
            "Prepared turn"
        );

        Ok(PreparedTurn {
            agent,
            session_key,
            overlay_changed: overlay.changed,
            tool_sync,
            batch,
        })
    }

    /// Rewrite a backend tool name to the caller's name.
    pub fn caller_tool_name(&self, agent_id: &str, backend_name: &str) -> String {
        self.tools
            .caller_name_for(agent_id, backend_name)
            .unwrap_or_else(|| self.tools.strip_prefix(backend_name).to_string())
    }

    pub fn debug_dump(&self) -> OverlayDebugDump {
        self.overlays.debug_dump()
    }
}
