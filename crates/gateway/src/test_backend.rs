//! In-memory backend for router tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use agentbridge_core::backend::{
    AgentBackend, AgentInfo, AgentResponse, Block, BlockUpdate, NewBlock,
};
use agentbridge_core::error::BackendError;
use agentbridge_core::message::OutboundMessage;
use agentbridge_core::tool::{BackendTool, ProxyToolStub};

#[derive(Default)]
struct Store {
    agents: Vec<AgentInfo>,
    tools: HashMap<String, Vec<BackendTool>>,
    blocks: HashMap<String, Block>,
    registered: Vec<String>,
    sent: Vec<Vec<OutboundMessage>>,
    next_id: usize,
}

#[derive(Default)]
pub struct ScriptedBackend {
    pub offline: bool,
    pub send_error: Option<BackendError>,
    pub response: AgentResponse,
    store: Mutex<Store>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(self, id: &str, name: &str) -> Self {
        self.store().agents.push(AgentInfo {
            id: id.into(),
            name: name.into(),
            project_id: None,
        });
        self
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut store = self.store();
        store.next_id += 1;
        format!("{prefix}-{}", store.next_id)
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.offline {
            Err(BackendError::Network("connection refused".into()))
        } else {
            Ok(())
        }
    }

    /// Batches passed to `send_messages`, in order.
    pub fn sent(&self) -> Vec<Vec<OutboundMessage>> {
        self.store().sent.clone()
    }

    /// Registered tool names, in order.
    pub fn registered(&self) -> Vec<String> {
        self.store().registered.clone()
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_agents(&self) -> Result<Vec<AgentInfo>, BackendError> {
        self.check_online()?;
        Ok(self.store().agents.clone())
    }

    async fn list_agent_tools(&self, agent_id: &str) -> Result<Vec<BackendTool>, BackendError> {
        self.check_online()?;
        Ok(self.store().tools.get(agent_id).cloned().unwrap_or_default())
    }

    async fn register_tool(&self, stub: &ProxyToolStub) -> Result<BackendTool, BackendError> {
        self.check_online()?;
        let id = self.next_id("tool");
        self.store().registered.push(stub.registered_name.clone());
        Ok(BackendTool {
            id,
            name: stub.registered_name.clone(),
        })
    }

    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), BackendError> {
        self.check_online()?;
        let mut store = self.store();
        let name = store
            .registered
            .last()
            .cloned()
            .unwrap_or_else(|| tool_id.to_string());
        store
            .tools
            .entry(agent_id.to_string())
            .or_default()
            .push(BackendTool {
                id: tool_id.into(),
                name,
            });
        Ok(())
    }

    async fn detach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), BackendError> {
        self.check_online()?;
        if let Some(tools) = self.store().tools.get_mut(agent_id) {
            tools.retain(|t| t.id != tool_id);
        }
        Ok(())
    }

    async fn list_agent_blocks(&self, _agent_id: &str) -> Result<Vec<Block>, BackendError> {
        self.check_online()?;
        Ok(self.store().blocks.values().cloned().collect())
    }

    async fn create_block(&self, block: NewBlock) -> Result<Block, BackendError> {
        self.check_online()?;
        let created = Block {
            id: self.next_id("block"),
            label: Some(block.label),
            value: block.value,
            metadata: Some(block.metadata),
            project_id: block.project_id,
            limit: Some(block.limit),
            read_only: block.read_only,
        };
        self.store()
            .blocks
            .insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update_block(&self, block_id: &str, update: BlockUpdate) -> Result<Block, BackendError> {
        self.check_online()?;
        let mut store = self.store();
        let block = store
            .blocks
            .get_mut(block_id)
            .ok_or_else(|| BackendError::NotFound(block_id.into()))?;
        block.value = update.value;
        Ok(block.clone())
    }

    async fn attach_block(&self, _agent_id: &str, _block_id: &str) -> Result<(), BackendError> {
        self.check_online()
    }

    async fn send_messages(
        &self,
        _agent_id: &str,
        messages: Vec<OutboundMessage>,
    ) -> Result<AgentResponse, BackendError> {
        self.check_online()?;
        self.store().sent.push(messages);
        match &self.send_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.response.clone()),
        }
    }
}
