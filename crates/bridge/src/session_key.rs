//! Session key derivation.
//!
//! A session key correlates requests that belong to the same overlay
//! session. Callers can pin one explicitly through the `x-session-id`
//! header; stateless callers that never send one still get overlay reuse
//! for byte-identical system prompts, because the key is derived from the
//! prompt's content hash.

use std::sync::Mutex;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::overlay::{content_hash, normalize_content};

/// Header carrying an explicit, caller-chosen session key.
pub const SESSION_HEADER: &str = "x-session-id";

/// Derives and caches session keys.
pub struct SessionKeyDeriver {
    derived: Mutex<TtlCache<String, String>>,
}

impl SessionKeyDeriver {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            derived: Mutex::new(TtlCache::new(max_entries, ttl)),
        }
    }

    /// Derive the session key for a request.
    ///
    /// Precedence: a non-empty explicit key verbatim, then
    /// `{agent_id}:{sha256(content)}` for non-empty system content, then
    /// `{agent_id}:default`.
    pub fn derive(
        &self,
        agent_id: &str,
        system_content: Option<&str>,
        explicit_key: Option<&str>,
    ) -> String {
        if let Some(key) = explicit_key.filter(|k| !k.trim().is_empty()) {
            return key.to_string();
        }

        let key = match system_content.map(normalize_content) {
            Some(content) if !content.is_empty() => {
                format!("{agent_id}:{}", content_hash(&content))
            }
            _ => format!("{agent_id}:default"),
        };

        let mut derived = self.derived.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = derived.get(&key) {
            return cached;
        }
        derived.set(key.clone(), key.clone());
        key
    }

    /// Live derived keys, least recently used first.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.derived
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .items()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deriver() -> SessionKeyDeriver {
        SessionKeyDeriver::new(100, Duration::from_secs(3600))
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_key_wins() {
        let d = deriver();
        let key = d.derive("agent-1", Some("You are helpful."), Some("s1"));
        assert_eq!(key, "s1");
        assert!(d.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn blank_explicit_key_ignored() {
        let d = deriver();
        let key = d.derive("agent-1", None, Some("  "));
        assert_eq!(key, "agent-1:default");
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_key_returned_verbatim() {
        let d = deriver();
        let key = d.derive("agent-1", None, Some(" s1 "));
        assert_eq!(key, " s1 ");
    }

    #[tokio::test(start_paused = true)]
    async fn content_key_is_stable() {
        let d = deriver();
        let first = d.derive("agent-1", Some("You are helpful."), None);
        let second = d.derive("agent-1", Some("You are helpful."), None);
        assert_eq!(first, second);
        assert!(first.starts_with("agent-1:"));
        assert_eq!(first.len(), "agent-1:".len() + 64);
        assert_eq!(d.entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn content_key_ignores_line_ending_style() {
        let d = deriver();
        let unix = d.derive("agent-1", Some("a\nb"), None);
        let windows = d.derive("agent-1", Some("a\r\nb"), None);
        assert_eq!(unix, windows);
    }

    #[tokio::test(start_paused = true)]
    async fn different_agents_different_keys() {
        let d = deriver();
        let a = d.derive("agent-1", Some("same"), None);
        let b = d.derive("agent-2", Some("same"), None);
        assert_ne!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_content_uses_default() {
        let d = deriver();
        assert_eq!(d.derive("agent-1", None, None), "agent-1:default");
        assert_eq!(d.derive("agent-1", Some(""), None), "agent-1:default");
        assert_eq!(d.derive("agent-1", Some("\0"), None), "agent-1:default");
        assert_eq!(d.entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn derived_entries_expire() {
        let d = SessionKeyDeriver::new(10, Duration::from_secs(5));
        d.derive("agent-1", None, None);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(d.entries().is_empty());
    }
}
