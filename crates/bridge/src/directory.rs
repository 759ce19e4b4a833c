//! Agent directory: resolves a caller's `model` to a backend agent.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use agentbridge_core::backend::{AgentBackend, AgentInfo};
use agentbridge_core::error::{BackendError, Error, Result};
use tracing::{info, warn};

/// Agents known to the backend, keyed by name.
pub struct AgentDirectory {
    backend: Arc<dyn AgentBackend>,
    agents: RwLock<BTreeMap<String, AgentInfo>>,
}

impl AgentDirectory {
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self {
            backend,
            agents: RwLock::new(BTreeMap::new()),
        }
    }

    /// Reload the agent list from the backend, returning how many agents it has.
    pub async fn refresh(&self) -> std::result::Result<usize, BackendError> {
        let agents = self.backend.list_agents().await?;
        let count = agents.len();
        let by_name = agents.into_iter().map(|a| (a.name.clone(), a)).collect();
        *self.agents.write().unwrap_or_else(|e| e.into_inner()) = by_name;
        info!(count, "Agent directory loaded");
        Ok(count)
    }

    fn lookup(&self, model: &str) -> Option<AgentInfo> {
        self.agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(model)
            .cloned()
    }

    /// Resolve `model` by exact agent name, refreshing once on a miss.
    pub async fn resolve(&self, model: &str) -> Result<AgentInfo> {
        if let Some(agent) = self.lookup(model) {
            return Ok(agent);
        }

        if let Err(e) = self.refresh().await {
            warn!(model, error = %e, "Agent directory refresh failed");
        }

        self.lookup(model).ok_or_else(|| Error::UnknownModel {
            model: model.to_string(),
            available: self.names(),
        })
    }

    /// Known agent names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{Call, RecordingBackend};

    #[tokio::test]
    async fn resolves_loaded_agent_without_backend_call() {
        let backend = Arc::new(RecordingBackend::new().with_agent("agent-1", "helper"));
        let directory = AgentDirectory::new(backend.clone());
        assert_eq!(directory.refresh().await.unwrap(), 1);
        backend.clear_calls();

        let agent = directory.resolve("helper").await.unwrap();
        assert_eq!(agent.id, "agent-1");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn miss_refreshes_once() {
        let backend = Arc::new(RecordingBackend::new().with_agent("agent-1", "helper"));
        let directory = AgentDirectory::new(backend.clone());

        let agent = directory.resolve("helper").await.unwrap();
        assert_eq!(agent.name, "helper");
        assert_eq!(backend.calls(), vec![Call::ListAgents]);
    }

    #[tokio::test]
    async fn unknown_model_lists_available() {
        let backend = Arc::new(
            RecordingBackend::new()
                .with_agent("agent-1", "helper")
                .with_agent("agent-2", "coder"),
        );
        let directory = AgentDirectory::new(backend);

        match directory.resolve("gpt-4").await {
            Err(Error::UnknownModel { model, available }) => {
                assert_eq!(model, "gpt-4");
                assert_eq!(available, vec!["coder", "helper"]);
            }
            other => panic!("expected UnknownModel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_unknown_model() {
        let mut backend = RecordingBackend::new();
        backend.fail_agents = true;
        let directory = AgentDirectory::new(Arc::new(backend));

        assert!(directory.refresh().await.is_err());
        let err = directory.resolve("helper").await.unwrap_err();
        assert!(err.is_client_error());
        assert!(directory.is_empty());
    }
}
