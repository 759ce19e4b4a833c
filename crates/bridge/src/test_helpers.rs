//! In-memory backend that records every call, for bridge tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use agentbridge_core::backend::*;
use agentbridge_core::error::BackendError;
use agentbridge_core::message::OutboundMessage;
use agentbridge_core::tool::{BackendTool, ProxyToolStub};
use async_trait::async_trait;

/// One backend call as observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListAgents,
    ListTools(String),
    RegisterTool(String),
    AttachTool(String, String),
    DetachTool(String, String),
    ListBlocks(String),
    CreateBlock(NewBlock),
    UpdateBlock(String, BlockUpdate),
    AttachBlock(String, String),
    SendMessages(String, Vec<OutboundMessage>),
}

impl Call {
    /// Whether the call changes backend state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::ListAgents | Self::ListTools(_) | Self::ListBlocks(_)
        )
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    agents: Vec<AgentInfo>,
    tools: HashMap<String, Vec<BackendTool>>,
    registry: HashMap<String, String>,
    blocks: HashMap<String, Vec<Block>>,
    next_id: u32,
}

#[derive(Default)]
pub struct RecordingBackend {
    state: Mutex<State>,
    pub fail_blocks: bool,
    pub fail_block_attach: bool,
    pub empty_block_id: bool,
    pub fail_list_tools: bool,
    pub fail_agents: bool,
    pub fail_register: HashSet<String>,
    pub response: AgentResponse,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(self, id: &str, name: &str) -> Self {
        self.state().agents.push(AgentInfo {
            id: id.into(),
            name: name.into(),
            project_id: None,
        });
        self
    }

    /// Pre-attach a tool to an agent.
    pub fn with_tool(self, agent_id: &str, tool_id: &str, name: &str) -> Self {
        self.state()
            .tools
            .entry(agent_id.into())
            .or_default()
            .push(BackendTool {
                id: tool_id.into(),
                name: name.into(),
            });
        self
    }

    /// Pre-attach a block to an agent.
    pub fn with_block(self, agent_id: &str, block_id: &str, label: &str, value: &str) -> Self {
        self.state()
            .blocks
            .entry(agent_id.into())
            .or_default()
            .push(Block {
                id: block_id.into(),
                label: Some(label.into()),
                value: value.into(),
                metadata: None,
                project_id: None,
                limit: None,
                read_only: true,
            });
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state();
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Names of the tools currently attached to an agent, sorted.
    pub fn attached_tool_names(&self, agent_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .state()
            .tools
            .get(agent_id)
            .map(|tools| tools.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Remove a tool behind the synchronizer's back.
    pub fn drop_tool(&self, agent_id: &str, name: &str) {
        if let Some(tools) = self.state().tools.get_mut(agent_id) {
            tools.retain(|t| t.name != name);
        }
    }

    pub fn blocks(&self, agent_id: &str) -> Vec<Block> {
        self.state().blocks.get(agent_id).cloned().unwrap_or_default()
    }
}

fn offline() -> BackendError {
    BackendError::Network("connection refused".into())
}

#[async_trait]
impl AgentBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn list_agents(&self) -> Result<Vec<AgentInfo>, BackendError> {
        self.record(Call::ListAgents);
        if self.fail_agents {
            return Err(offline());
        }
        Ok(self.state().agents.clone())
    }

    async fn list_agent_tools(&self, agent_id: &str) -> Result<Vec<BackendTool>, BackendError> {
        self.record(Call::ListTools(agent_id.into()));
        if self.fail_list_tools {
            return Err(offline());
        }
        Ok(self.state().tools.get(agent_id).cloned().unwrap_or_default())
    }

    async fn register_tool(&self, stub: &ProxyToolStub) -> Result<BackendTool, BackendError> {
        self.record(Call::RegisterTool(stub.registered_name.clone()));
        if self.fail_register.contains(&stub.caller_name) {
            return Err(BackendError::ApiError {
                status_code: 422,
                message: "invalid schema".into(),
            });
        }
        let existing = self.state().registry.get(&stub.registered_name).cloned();
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.next_id("tool");
                self.state()
                    .registry
                    .insert(stub.registered_name.clone(), id.clone());
                id
            }
        };
        Ok(BackendTool {
            id,
            name: stub.registered_name.clone(),
        })
    }

    async fn attach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), BackendError> {
        self.record(Call::AttachTool(agent_id.into(), tool_id.into()));
        let mut state = self.state();
        let name = state
            .registry
            .iter()
            .find(|(_, id)| id.as_str() == tool_id)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| BackendError::NotFound(tool_id.into()))?;
        state
            .tools
            .entry(agent_id.into())
            .or_default()
            .push(BackendTool {
                id: tool_id.into(),
                name,
            });
        Ok(())
    }

    async fn detach_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), BackendError> {
        self.record(Call::DetachTool(agent_id.into(), tool_id.into()));
        if let Some(tools) = self.state().tools.get_mut(agent_id) {
            tools.retain(|t| t.id != tool_id);
        }
        Ok(())
    }

    async fn list_agent_blocks(&self, agent_id: &str) -> Result<Vec<Block>, BackendError> {
        self.record(Call::ListBlocks(agent_id.into()));
        if self.fail_blocks {
            return Err(offline());
        }
        Ok(self.blocks(agent_id))
    }

    async fn create_block(&self, block: NewBlock) -> Result<Block, BackendError> {
        self.record(Call::CreateBlock(block.clone()));
        if self.fail_blocks {
            return Err(offline());
        }
        let id = if self.empty_block_id {
            String::new()
        } else {
            self.next_id("block")
        };
        Ok(Block {
            id,
            label: Some(block.label),
            value: block.value,
            metadata: Some(block.metadata),
            project_id: block.project_id,
            limit: Some(block.limit),
            read_only: block.read_only,
        })
    }

    async fn update_block(
        &self,
        block_id: &str,
        update: BlockUpdate,
    ) -> Result<Block, BackendError> {
        self.record(Call::UpdateBlock(block_id.into(), update.clone()));
        if self.fail_blocks {
            return Err(offline());
        }
        let mut state = self.state();
        let block = state
            .blocks
            .values_mut()
            .flatten()
            .find(|b| b.id == block_id)
            .ok_or_else(|| BackendError::NotFound(block_id.into()))?;
        block.value = update.value;
        Ok(block.clone())
    }

    async fn attach_block(&self, agent_id: &str, block_id: &str) -> Result<(), BackendError> {
        self.record(Call::AttachBlock(agent_id.into(), block_id.into()));
        if self.fail_blocks || self.fail_block_attach {
            return Err(offline());
        }
        let created = self
            .calls()
            .into_iter()
            .rev()
            .find_map(|call| match call {
                Call::CreateBlock(block) => Some(block),
                _ => None,
            })
            .ok_or_else(|| BackendError::NotFound(block_id.into()))?;
        self.state()
            .blocks
            .entry(agent_id.into())
            .or_default()
            .push(Block {
                id: block_id.into(),
                label: Some(created.label),
                value: created.value,
                metadata: Some(created.metadata),
                project_id: created.project_id,
                limit: Some(created.limit),
                read_only: created.read_only,
            });
        Ok(())
    }

    async fn send_messages(
        &self,
        agent_id: &str,
        messages: Vec<OutboundMessage>,
    ) -> Result<AgentResponse, BackendError> {
        self.record(Call::SendMessages(agent_id.into(), messages));
        Ok(self.response.clone())
    }
}
