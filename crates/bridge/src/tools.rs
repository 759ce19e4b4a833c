//! Tool registry synchronization.
//!
//! Callers send their full tool list on every request. The backend keeps
//! tools attached to the agent between requests, and its built-in tools
//! share the same namespace. Every caller tool is therefore mirrored by a
//! proxy tool registered under a reserved prefix, and only prefixed tools
//! are ever attached or detached here.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use agentbridge_core::backend::AgentBackend;
use agentbridge_core::error::{BackendError, ToolSyncFailure};
use agentbridge_core::tool::{BackendTool, ParamKind, ProxyToolStub, StubParameter, ToolSchema};
use tracing::{debug, info, warn};

/// Associations between caller tool names and backend tool handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolMapping {
    /// caller name -> backend handle
    handles: HashMap<String, String>,
    /// backend handle -> registered (prefixed) name
    names: HashMap<String, String>,
}

impl ToolMapping {
    fn insert(&mut self, caller_name: &str, tool: &BackendTool) {
        self.handles.insert(caller_name.to_string(), tool.id.clone());
        self.names.insert(tool.id.clone(), tool.name.clone());
    }

    pub fn handle(&self, caller_name: &str) -> Option<&str> {
        self.handles.get(caller_name).map(String::as_str)
    }

    pub fn registered_name(&self, handle: &str) -> Option<&str> {
        self.names.get(handle).map(String::as_str)
    }

    /// The caller name mapped to `handle`.
    pub fn caller_name(&self, handle: &str) -> Option<&str> {
        self.handles
            .iter()
            .find(|(_, id)| id.as_str() == handle)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// What one `sync` call did.
#[derive(Debug, Clone, Default)]
pub struct ToolSyncReport {
    /// Caller names newly registered and attached
    pub attached: Vec<String>,

    /// Registered names detached from the agent
    pub detached: Vec<String>,

    /// Caller names already attached
    pub unchanged: Vec<String>,

    pub failed: Vec<ToolSyncFailure>,
}

impl ToolSyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether the call changed the agent's attachments.
    pub fn changed(&self) -> bool {
        !self.attached.is_empty() || !self.detached.is_empty()
    }
}

/// Reconciles an agent's proxy tools against the caller's requested tools.
///
/// Callers must serialize `sync` per agent (see `KeyedLocks`).
pub struct ToolSynchronizer {
    backend: Arc<dyn AgentBackend>,
    prefix: String,
    mappings: Mutex<HashMap<String, ToolMapping>>,
}

impl ToolSynchronizer {
    pub fn new(backend: Arc<dyn AgentBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            mappings: Mutex::new(HashMap::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The backend-side name for a caller tool.
    ///
    /// Registered names double as Python function names, so characters
    /// outside `[A-Za-z0-9_]` become `_`. The mapping keeps the caller's
    /// original name for the reverse lookup.
    pub fn registered_name(&self, caller_name: &str) -> String {
        let sanitized: String = caller_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}{sanitized}", self.prefix)
    }

    /// The caller-side name for a backend tool name; unprefixed names pass through.
    pub fn strip_prefix<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }

    fn is_proxy(&self, name: &str) -> bool {
        name.starts_with(self.prefix.as_str())
    }

    fn mappings(&self) -> std::sync::MutexGuard<'_, HashMap<String, ToolMapping>> {
        self.mappings.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A copy of the current mapping for an agent.
    pub fn mapping(&self, agent_id: &str) -> Option<ToolMapping> {
        self.mappings().get(agent_id).cloned()
    }

    /// The backend handle of a caller tool attached to `agent_id`.
    pub fn backend_tool_id(&self, agent_id: &str, caller_name: &str) -> Option<String> {
        self.mappings()
            .get(agent_id)?
            .handle(caller_name)
            .map(String::from)
    }

    /// The caller name of a registered backend tool attached to `agent_id`.
    pub fn caller_name_for(&self, agent_id: &str, backend_name: &str) -> Option<String> {
        let mappings = self.mappings();
        let mapping = mappings.get(agent_id)?;
        mapping
            .names
            .iter()
            .find(|(_, name)| name.as_str() == backend_name)
            .and_then(|(handle, _)| mapping.caller_name(handle))
            .map(String::from)
    }

    /// Build the registration payload for a caller tool.
    pub fn build_stub(&self, tool: &ToolSchema) -> ProxyToolStub {
        let caller_name = tool.name().to_string();
        let registered_name = self.registered_name(&caller_name);
        let params = tool.function.parameters.as_ref();

        let parameters = params
            .and_then(|p| p.get("properties"))
            .and_then(|p| p.as_object())
            .map(|props| {
                props
                    .iter()
                    .map(|(name, schema)| StubParameter {
                        name: name.clone(),
                        kind: ParamKind::from_json_type(
                            schema.get("type").and_then(|t| t.as_str()),
                        ),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let required = params
            .and_then(|p| p.get("required"))
            .and_then(|r| r.as_array())
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let mut json_schema = serde_json::json!({
            "name": registered_name,
            "description": tool.function.description.clone().unwrap_or_default(),
            "parameters": params.cloned().unwrap_or_else(|| serde_json::json!({
                "type": "object",
                "properties": {},
            })),
        });
        if tool.function.description.is_none() {
            json_schema["description"] = format!("Proxy tool for {caller_name}").into();
        }

        ProxyToolStub {
            description: format!("Proxy tool for {caller_name}"),
            registered_name,
            caller_name,
            parameters,
            required,
            json_schema,
        }
    }

    /// Make the agent's proxy tools match `requested` exactly.
    ///
    /// Built-in (unprefixed) tools are never touched. A tool that fails to
    /// register, attach or detach is reported and the rest still sync; only
    /// failing to list the agent's tools fails the whole call.
    pub async fn sync(
        &self,
        agent_id: &str,
        requested: &[ToolSchema],
    ) -> Result<ToolSyncReport, BackendError> {
        let attached = self.backend.list_agent_tools(agent_id).await?;
        let mut report = ToolSyncReport::default();
        let mut mapping = ToolMapping::default();

        // First occurrence wins for names that register identically
        let mut seen = HashSet::new();
        let requested: Vec<&ToolSchema> = requested
            .iter()
            .filter(|t| seen.insert(self.registered_name(t.name())))
            .collect();
        let wanted: HashSet<String> = requested
            .iter()
            .map(|t| self.registered_name(t.name()))
            .collect();

        for tool in attached.iter().filter(|t| self.is_proxy(&t.name)) {
            if wanted.contains(&tool.name) {
                continue;
            }
            match self.backend.detach_tool(agent_id, &tool.id).await {
                Ok(()) => {
                    info!(agent_id, tool = %tool.name, "Detached proxy tool");
                    report.detached.push(tool.name.clone());
                }
                Err(e) => {
                    warn!(agent_id, tool = %tool.name, error = %e, "Failed to detach proxy tool");
                    report.failed.push(ToolSyncFailure {
                        tool: tool.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if requested.is_empty() {
            debug!(agent_id, "No tools requested, proxy tools cleared");
            self.mappings().remove(agent_id);
            return Ok(report);
        }

        for tool in requested {
            let caller_name = tool.name();
            let registered = self.registered_name(caller_name);

            if let Some(existing) = attached.iter().find(|t| t.name == registered) {
                mapping.insert(caller_name, existing);
                report.unchanged.push(caller_name.to_string());
                continue;
            }

            match self.register_and_attach(agent_id, tool).await {
                Ok(handle) => {
                    info!(agent_id, tool = %caller_name, "Attached proxy tool");
                    mapping.insert(caller_name, &handle);
                    report.attached.push(caller_name.to_string());
                }
                Err(e) => {
                    warn!(agent_id, tool = %caller_name, error = %e, "Failed to sync proxy tool");
                    report.failed.push(ToolSyncFailure {
                        tool: caller_name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            agent_id,
            attached = report.attached.len(),
            detached = report.detached.len(),
            failed = report.failed.len(),
            "Tool sync complete"
        );
        self.mappings().insert(agent_id.to_string(), mapping);
        Ok(report)
    }

    async fn register_and_attach(
        &self,
        agent_id: &str,
        tool: &ToolSchema,
    ) -> Result<BackendTool, BackendError> {
        let stub = self.build_stub(tool);
        let handle = self.backend.register_tool(&stub).await?;
        self.backend.attach_tool(agent_id, &handle.id).await?;
        Ok(handle)
    }
}
