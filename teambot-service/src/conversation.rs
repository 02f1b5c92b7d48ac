//! Bounded in-memory conversation history.
//!
//! Each conversation holds at most `max_history` messages. When an append
//! pushes a history past the cap, every system message is kept and the
//! oldest user/assistant turns are dropped.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::message::{ConversationSummary, Message, Role};

/// Thread-safe store of per-conversation message histories.
#[derive(Debug)]
pub struct ConversationStore {
    max_history: usize,
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl ConversationStore {
    /// Create a store capping each history at `max_history` messages.
    ///
    /// A cap of zero is treated as one.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Append a message and trim the history to the cap.
    pub fn add_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: impl Into<String>,
        user_name: Option<String>,
    ) {
        let message = Message::new(role, content).with_user_name(user_name);

        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let history = conversations
            .entry(conversation_id.to_string())
            .or_default();
        history.push(message);

        if history.len() > self.max_history {
            let before = history.len();
            trim_history(history, self.max_history);
            tracing::debug!(
                conversation_id,
                dropped = before - history.len(),
                "Trimmed conversation history"
            );
        }
    }

    /// Replace any system messages with a single one at the head.
    pub fn set_system_message(&self, conversation_id: &str, content: impl Into<String>) {
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let history = conversations
            .entry(conversation_id.to_string())
            .or_default();
        history.retain(|m| !m.is_system());
        history.insert(0, Message::system(content));
    }

    /// Snapshot of the ordered history; empty if the conversation is unknown.
    pub fn get_conversation(&self, conversation_id: &str) -> Vec<Message> {
        self.conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any state exists for the conversation.
    pub fn contains(&self, conversation_id: &str) -> bool {
        self.conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(conversation_id)
    }

    /// Remove all state for the conversation. Returns whether it existed.
    pub fn clear(&self, conversation_id: &str) -> bool {
        self.conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(conversation_id)
            .is_some()
    }

    /// Turn statistics for the conversation.
    pub fn summary(&self, conversation_id: &str) -> ConversationSummary {
        let conversations = self
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        conversations
            .get(conversation_id)
            .map(|history| ConversationSummary::from_messages(history))
            .unwrap_or_default()
    }

    /// Number of live conversations.
    pub fn conversation_count(&self) -> usize {
        self.conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Keep all system messages plus the newest `max - systems` other messages.
fn trim_history(history: &mut Vec<Message>, max: usize) {
    let (system, rest): (Vec<Message>, Vec<Message>) =
        std::mem::take(history).into_iter().partition(Message::is_system);

    let keep = max.saturating_sub(system.len());
    let skip = rest.len().saturating_sub(keep);

    history.extend(system);
    history.extend(rest.into_iter().skip(skip));
}
