//! # AgentBridge Bridge
//!
//! Per-request reconciliation between a stateless chat-completions caller
//! and a stateful agent backend: system prompt overlays, proxy tool sync,
//! and the outbound message batch.

pub mod bridge;
pub mod cache;
pub mod directory;
pub mod locks;
pub mod overlay;
pub mod overlay_store;
pub mod reconcile;
pub mod session_key;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bridge::{Bridge, PreparedTurn, TurnRequest};
pub use cache::TtlCache;
pub use directory::AgentDirectory;
pub use locks::KeyedLocks;
pub use overlay::{OverlayDebugDump, OverlayManager, OverlayOutcome, SessionDebug};
pub use overlay_store::{SessionOverlayState, SessionOverlayStore};
pub use reconcile::OutboundBatch;
pub use session_key::{SESSION_HEADER, SessionKeyDeriver};
pub use tools::{ToolMapping, ToolSyncReport, ToolSynchronizer};
