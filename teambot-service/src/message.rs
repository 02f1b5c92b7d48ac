//! Message types for conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Get the role as the wire string used by chat completion APIs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// When the message was recorded (UTC)
    pub timestamp: DateTime<Utc>,
    /// Display name of the author, for user turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            user_name: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach the author's display name.
    pub fn with_user_name(mut self, user_name: Option<String>) -> Self {
        self.user_name = user_name;
        self
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Statistics about a single conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// User plus assistant turns; the system directive is not counted
    pub message_count: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    /// Distinct user names seen on user turns, sorted
    pub participants: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    /// Summarize an ordered history.
    pub fn from_messages(messages: &[Message]) -> Self {
        let user_messages = messages.iter().filter(|m| m.role == Role::User).count();
        let assistant_messages = messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();

        let mut participants: Vec<String> = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .filter_map(|m| m.user_name.clone())
            .collect();
        participants.sort();
        participants.dedup();

        Self {
            message_count: user_messages + assistant_messages,
            user_messages,
            assistant_messages,
            participants,
            start_time: messages.iter().map(|m| m.timestamp).min(),
            last_activity: messages.iter().map(|m| m.timestamp).max(),
        }
    }

    /// Whether the conversation has no user or assistant turns.
    pub fn is_empty(&self) -> bool {
        self.message_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn test_message_omits_missing_user_name() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert!(json.get("user_name").is_none());
        assert_eq!(json["role"], "assistant");

        let json =
            serde_json::to_value(Message::user("hi").with_user_name(Some("Ada".into()))).unwrap();
        assert_eq!(json["user_name"], "Ada");
    }

    #[test]
    fn test_summary_counts_turns() {
        let messages = vec![
            Message::system("be helpful"),
            Message::user("hello").with_user_name(Some("Bob".into())),
            Message::assistant("hi Bob"),
            Message::user("again").with_user_name(Some("Ada".into())),
            Message::user("and again").with_user_name(Some("Bob".into())),
            Message::user("anonymous"),
        ];

        let summary = ConversationSummary::from_messages(&messages);
        assert_eq!(summary.message_count, 5);
        assert_eq!(summary.user_messages, 4);
        assert_eq!(summary.assistant_messages, 1);
        assert_eq!(summary.participants, vec!["Ada", "Bob"]);
        assert_eq!(summary.start_time, Some(messages[0].timestamp));
        assert!(summary.last_activity >= summary.start_time);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ConversationSummary::from_messages(&[]);
        assert!(summary.is_empty());
        assert!(summary.participants.is_empty());
        assert!(summary.start_time.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["message_count"], 0);
        assert!(json["last_activity"].is_null());
    }
}
