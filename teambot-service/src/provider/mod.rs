//! Chat completion provider abstraction.
//!
//! [`ChatService`](crate::chat::ChatService) talks to the model through the
//! [`Provider`] trait so tests can substitute scripted providers.

mod azure;

pub use azure::{AzureOpenAiProvider, Deployment};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

// ============================================================================
// Provider Trait
// ============================================================================

/// Interface to a chat completion API.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Model or deployment the provider sends requests to.
    fn model(&self) -> &str;

    /// Send a chat completion request.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

/// Error from a provider.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
    pub status_code: Option<u16>,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "[{}:{}] HTTP {}: {}", self.provider, self.model, code, self.message),
            None => write!(f, "[{}:{}] {}", self.provider, self.model, self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A role/content pair as sent to the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Completion request built from a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl CompletionRequest {
    /// Build a request from an ordered history.
    pub fn from_history(history: &[Message], max_tokens: u32, temperature: f64) -> Self {
        Self {
            messages: history.iter().map(ChatMessage::from).collect(),
            max_tokens,
            temperature,
        }
    }
}

/// Completion returned by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    /// Response latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_history_keeps_order() {
        let history = vec![
            Message::system("directive"),
            Message::user("hello").with_user_name(Some("Ada".into())),
            Message::assistant("hi"),
        ];

        let request = CompletionRequest::from_history(&history, 100, 0.5);
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(request.messages[1].content, "hello");

        let json = serde_json::to_value(&request.messages[1]).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new("azure-openai", "gpt-35-turbo", "boom");
        assert_eq!(err.to_string(), "[azure-openai:gpt-35-turbo] boom");

        let err = err.with_status(429);
        assert_eq!(err.to_string(), "[azure-openai:gpt-35-turbo] HTTP 429: boom");
    }
}
