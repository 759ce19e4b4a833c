//! Agent backend clients for AgentBridge.
//!
//! All clients implement the `agentbridge_core::AgentBackend` trait.
//! `LettaClient` talks to a Letta server over its REST API.

pub mod letta;
pub mod stub;

pub use letta::LettaClient;
