//! Chat service: conversation memory, rate limiting and retries around a provider.
//!
//! A turn appends the user message, sends the whole history to the provider
//! and records the reply. Provider failures are retried with exponential
//! backoff; when every attempt fails the turn answers with [`APOLOGY`] and
//! never surfaces an error.
//!
//! Turns on the same conversation are serialised by a per-conversation
//! async lock held from the system-message check to the final append.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use teambot_common::config::Config;
use teambot_common::turn_span;

use crate::conversation::ConversationStore;
use crate::message::{ConversationSummary, Message, Role};
use crate::provider::{CompletionRequest, Provider};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;

/// Reply used when every attempt fails.
pub const APOLOGY: &str = "I'm sorry, I'm having trouble connecting to my AI service right now. \
                           Please try again in a moment.";

/// Directive installed on new conversations that do not bring their own.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant integrated with Microsoft Teams. \
     Provide clear, concise, and professional responses. \
     If you're unsure about something, be honest about it. \
     Format your responses appropriately for Teams chat.";

/// Sampling settings forwarded with every completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionSettings {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

/// One inbound chat turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub message: String,
    pub conversation_id: String,
    pub user_name: Option<String>,
    pub system_message: Option<String>,
    /// Overrides the service's attempt budget for this turn
    pub max_retries: Option<u32>,
    /// Inbound trace id; a fresh one is generated when absent
    pub trace_id: Option<String>,
}

impl ChatTurn {
    pub fn new(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: conversation_id.into(),
            user_name: None,
            system_message: None,
            max_retries: None,
            trace_id: None,
        }
    }

    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Composes the conversation store, rate limiter and retry policy with a provider.
pub struct ChatService {
    provider: Arc<dyn Provider>,
    store: Arc<ConversationStore>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    settings: CompletionSettings,
    turn_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<ConversationStore>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            provider,
            store,
            limiter,
            retry,
            settings,
            turn_locks: DashMap::new(),
        }
    }

    /// Build the service and its owned state from configuration.
    pub fn from_config(config: &Config, provider: Arc<dyn Provider>) -> Self {
        let conversation = &config.conversation;
        Self::new(
            provider,
            Arc::new(ConversationStore::new(conversation.max_history)),
            Arc::new(RateLimiter::new(
                "azure-openai",
                conversation.rate_limit_per_minute,
            )),
            RetryPolicy::with_max_attempts(conversation.max_retries),
            CompletionSettings {
                max_tokens: conversation.max_tokens,
                temperature: conversation.temperature,
            },
        )
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Run one chat turn and return the assistant reply.
    ///
    /// Never fails: if every attempt errors, the apology is recorded and returned.
    pub async fn get_response(&self, turn: ChatTurn) -> String {
        let trace_id = turn
            .trace_id
            .clone()
            .unwrap_or_else(teambot_common::logging::generate_trace_id);
        let span = turn_span!(trace_id, conversation_id = %turn.conversation_id);
        self.run_turn(turn).instrument(span).await
    }

    async fn run_turn(&self, turn: ChatTurn) -> String {
        let ChatTurn {
            message,
            conversation_id,
            user_name,
            system_message,
            max_retries,
            ..
        } = turn;

        let lock = self.turn_lock(&conversation_id);
        let guard = lock.lock().await;

        if system_message.is_some() || !self.store.contains(&conversation_id) {
            self.store.set_system_message(
                &conversation_id,
                system_message.as_deref().unwrap_or(DEFAULT_SYSTEM_MESSAGE),
            );
        }

        self.store
            .add_message(&conversation_id, Role::User, message, user_name);

        let history = self.store.get_conversation(&conversation_id);
        let request = CompletionRequest::from_history(
            &history,
            self.settings.max_tokens,
            self.settings.temperature,
        );

        let policy = match max_retries {
            Some(n) => RetryPolicy {
                max_attempts: n.max(1),
                ..self.retry
            },
            None => self.retry,
        };

        let reply = self.complete_with_retry(request, policy).await;
        self.store
            .add_message(&conversation_id, Role::Assistant, reply.clone(), None);

        drop(guard);
        drop(lock);
        self.release_turn_lock(&conversation_id);
        reply
    }

    async fn complete_with_retry(&self, request: CompletionRequest, policy: RetryPolicy) -> String {
        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;

            debug!(
                attempt = attempt + 1,
                provider = self.provider.name(),
                model = self.provider.model(),
                "Sending completion request"
            );

            match self.provider.complete(request.clone()).await {
                Ok(completion) => {
                    info!(
                        attempt = attempt + 1,
                        latency_ms = completion.latency_ms,
                        "Completion received"
                    );
                    return completion.content;
                }
                Err(e) if policy.should_retry(attempt) => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt = attempt + 1, error = %e, "Completion failed, giving up");
                    return APOLOGY.to_string();
                }
            }
        }
    }

    fn turn_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.turn_locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// Forget the lock entry once nobody holds or waits on it.
    fn release_turn_lock(&self, conversation_id: &str) {
        self.turn_locks
            .remove_if(conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Drop all history for the conversation.
    ///
    /// Waits for an in-flight turn on the same conversation to finish first.
    pub async fn clear_conversation(&self, conversation_id: &str) -> bool {
        let lock = self.turn_lock(conversation_id);
        let existed = {
            let _guard = lock.lock().await;
            self.store.clear(conversation_id)
        };
        drop(lock);
        self.release_turn_lock(conversation_id);

        info!(conversation_id, existed, "Cleared conversation history");
        existed
    }

    /// Number of conversations with a live turn lock.
    pub fn active_turn_locks(&self) -> usize {
        self.turn_locks.len()
    }

    pub fn conversation_summary(&self, conversation_id: &str) -> ConversationSummary {
        self.store.summary(conversation_id)
    }

    pub fn conversation(&self, conversation_id: &str) -> Vec<Message> {
        self.store.get_conversation(conversation_id)
    }
}
