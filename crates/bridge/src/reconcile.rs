//! Message reconciliation.
//!
//! The backend already remembers the conversation, so each request forwards
//! only what is new: overlay fallbacks, pending tool results, and the
//! latest user turn. Replaying the caller's transcript would duplicate the
//! agent's memory.

use std::collections::HashSet;

use agentbridge_core::message::{ChatMessage, OutboundMessage, Role};
use agentbridge_core::tool::ToolResultInput;

/// The ordered set of messages forwarded for one request.
pub type OutboundBatch = Vec<OutboundMessage>;

/// Join all non-empty system messages with a blank line.
pub fn collect_system_content(transcript: &[ChatMessage]) -> Option<String> {
    let chunks: Vec<String> = transcript
        .iter()
        .filter(|m| m.role == Role::System)
        .map(ChatMessage::text)
        .filter(|text| !text.is_empty())
        .collect();

    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n\n"))
    }
}

/// Tool messages after the last assistant turn (all of them if there is none).
pub fn trailing_tool_messages(transcript: &[ChatMessage]) -> Vec<&ChatMessage> {
    let start = transcript
        .iter()
        .rposition(|m| m.role == Role::Assistant)
        .map_or(0, |idx| idx + 1);

    transcript[start..]
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect()
}

/// Text of the most recent user turn; empty content still counts as a turn.
pub fn latest_user_text(transcript: &[ChatMessage]) -> Option<String> {
    transcript
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(ChatMessage::text)
}

/// Build the outbound batch.
///
/// Order is fixed: fallback messages, explicit tool results, trailing tool
/// messages whose call id was not already covered, then at most one user
/// message.
pub fn build_batch(
    fallback_messages: Vec<OutboundMessage>,
    tool_results: &[ToolResultInput],
    trailing_tool_messages: &[&ChatMessage],
    transcript: &[ChatMessage],
) -> OutboundBatch {
    let mut batch = fallback_messages;
    let mut seen: HashSet<Option<&str>> = HashSet::new();

    for result in tool_results {
        seen.insert(result.tool_call_id.as_deref());
        batch.push(OutboundMessage::tool_result(
            result.tool_call_id.clone(),
            result.result.to_string(),
        ));
    }

    for message in trailing_tool_messages {
        let id = message.tool_call_id.as_deref();
        if id.is_some() && !seen.insert(id) {
            continue;
        }
        batch.push(OutboundMessage::tool_result(
            message.tool_call_id.clone(),
            message.text(),
        ));
    }

    if let Some(text) = latest_user_text(transcript) {
        batch.push(OutboundMessage::user(text));
    }

    batch
}
