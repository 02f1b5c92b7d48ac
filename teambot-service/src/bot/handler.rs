//! Teams bot activity handler.

use std::sync::Arc;
use tracing::{error, info};

use super::activity::{Activity, ActivityType};
use super::cards;
use crate::chat::{ChatService, ChatTurn};
use crate::traits::{ActivitySender, ChannelError, ChannelResult};
use teambot_common::util::{clamp_user_input, mask_sensitive_data, strip_mentions, truncate_with_ellipsis};

/// Longest user message forwarded to the model, in characters.
pub const MAX_INPUT_CHARS: usize = 4000;

pub const CLEARED_REPLY: &str = "✅ Conversation history cleared!";
pub const NO_HISTORY_REPLY: &str = "📊 No conversation history found.";
pub const ERROR_REPLY: &str = "I'm sorry, I encountered an error while processing your message. \
                               Please try again or contact support if the issue persists.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Help,
    Clear,
    Summary,
}

impl Command {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "help" | "/help" => Some(Self::Help),
            "clear" | "/clear" => Some(Self::Clear),
            "summary" | "/summary" => Some(Self::Summary),
            _ => None,
        }
    }
}

/// Handles inbound Bot Framework activities.
pub struct TeamsBot {
    chat: Arc<ChatService>,
}

impl TeamsBot {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    /// Process one inbound activity, sending replies through `sender`.
    ///
    /// Failures while handling a message are answered with a generic error
    /// reply; an error is returned only when that reply cannot be sent either.
    pub async fn on_turn(&self, activity: &Activity, sender: &dyn ActivitySender) -> ChannelResult<()> {
        match activity.activity_type {
            ActivityType::Message => {
                if let Err(e) = self.on_message(activity, sender).await {
                    error!(error = %e, "Error handling message activity");
                    sender.send(&activity.reply_text(ERROR_REPLY)).await?;
                }
                Ok(())
            }
            ActivityType::ConversationUpdate => self.on_members_added(activity, sender).await,
            other => {
                tracing::debug!(activity_type = ?other, "Ignoring activity");
                Ok(())
            }
        }
    }

    async fn on_message(&self, activity: &Activity, sender: &dyn ActivitySender) -> ChannelResult<()> {
        let conversation_id = activity
            .conversation_id()
            .ok_or_else(|| ChannelError::InvalidActivity("missing conversation".into()))?;
        let user_name = activity.sender_name().unwrap_or("Unknown User");

        let text = strip_mentions(activity.text.as_deref().unwrap_or_default());
        if text.is_empty() {
            return Ok(());
        }

        info!(
            conversation_id,
            user = user_name,
            text = %truncate_with_ellipsis(&mask_sensitive_data(&text), 80),
            "Received message"
        );

        match Command::parse(&text) {
            Some(Command::Help) => {
                sender
                    .send(&activity.reply_attachment(cards::help_card()))
                    .await
            }
            Some(Command::Clear) => {
                self.chat.clear_conversation(conversation_id).await;
                sender.send(&activity.reply_text(CLEARED_REPLY)).await
            }
            Some(Command::Summary) => {
                let summary = self.chat.conversation_summary(conversation_id);
                let reply = if summary.is_empty() {
                    activity.reply_text(NO_HISTORY_REPLY)
                } else {
                    activity.reply_attachment(cards::summary_card(&summary))
                };
                sender.send(&reply).await
            }
            None => {
                let message = clamp_user_input(&text, MAX_INPUT_CHARS);

                sender.send(&activity.typing()).await?;

                let response = self
                    .chat
                    .get_response(ChatTurn::new(conversation_id, message).user_name(user_name))
                    .await;

                sender.send(&activity.reply_text(response)).await?;
                info!(conversation_id, user = user_name, "Sent AI response");
                Ok(())
            }
        }
    }

    async fn on_members_added(&self, activity: &Activity, sender: &dyn ActivitySender) -> ChannelResult<()> {
        for member in activity.added_members() {
            info!(member = %member.id, "Welcoming new member");

            sender
                .send(&activity.reply_attachment(cards::welcome_card(member.name.as_deref())))
                .await?;

            let prompt = activity
                .reply_text("What would you like to do?")
                .with_suggested_actions(cards::welcome_actions());
            sender.send(&prompt).await?;
        }
        Ok(())
    }
}
