//! Per-session overlay state, kept in a TTL/LRU cache.

use std::time::Duration;
use tokio::time::Instant;

use crate::cache::TtlCache;

/// What the gateway knows about one session's overlay block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOverlayState {
    /// sha256 of the last content applied (or attempted)
    pub overlay_hash: Option<String>,

    /// Handle of the backend block holding the content
    pub block_id: Option<String>,

    /// Whether the in-band fallback was already sent for `overlay_hash`
    pub fallback_applied: bool,

    pub last_updated: Instant,
}

impl Default for SessionOverlayState {
    fn default() -> Self {
        Self {
            overlay_hash: None,
            block_id: None,
            fallback_applied: false,
            last_updated: Instant::now(),
        }
    }
}

impl SessionOverlayState {
    /// The block handle, if one is known and non-empty.
    pub fn block(&self) -> Option<&str> {
        self.block_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether `hash` is already applied to a known block.
    pub fn is_current(&self, hash: &str) -> bool {
        self.overlay_hash.as_deref() == Some(hash) && self.block().is_some()
    }
}

/// TTL/LRU store of session overlay states.
pub struct SessionOverlayStore {
    cache: TtlCache<String, SessionOverlayState>,
}

impl SessionOverlayStore {
    pub fn new(max_sessions: usize, ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(max_sessions, ttl),
        }
    }

    pub fn get(&mut self, session_key: &str) -> Option<SessionOverlayState> {
        self.cache.get(session_key)
    }

    /// Store `state`, stamping `last_updated` and refreshing its TTL.
    pub fn set(&mut self, session_key: &str, mut state: SessionOverlayState) {
        state.last_updated = Instant::now();
        self.cache.set(session_key.to_string(), state);
    }

    pub fn items(&mut self) -> Vec<(String, SessionOverlayState)> {
        self.cache.items()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
