//! Bot Framework activity schema (the subset the bot reads and writes).

use serde::{Deserialize, Serialize};

/// Activity type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Message,
    Typing,
    ConversationUpdate,
    /// Any type the bot does not handle
    #[serde(other)]
    Unknown,
}

/// A user or bot account on a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
}

/// A rich attachment such as an adaptive card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    pub content: serde_json::Value,
}

/// A button offered to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub title: String,
    pub value: String,
}

impl CardAction {
    /// An action that posts `value` back as if the user typed it.
    pub fn im_back(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action_type: "imBack".into(),
            title: title.into(),
            value: value.into(),
        }
    }
}

/// Quick-reply buttons shown under a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedActions {
    pub actions: Vec<CardAction>,
}

/// A Bot Framework activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_format: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<SuggestedActions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Activity {
    /// An empty activity of the given type.
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            id: None,
            timestamp: None,
            service_url: None,
            channel_id: None,
            from: None,
            conversation: None,
            recipient: None,
            text: None,
            text_format: None,
            attachments: Vec::new(),
            members_added: Vec::new(),
            suggested_actions: None,
            reply_to_id: None,
            locale: None,
        }
    }

    /// A reply addressed back to the sender of this activity.
    pub fn create_reply(&self, activity_type: ActivityType) -> Self {
        Self {
            service_url: self.service_url.clone(),
            channel_id: self.channel_id.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            reply_to_id: self.id.clone(),
            locale: self.locale.clone(),
            ..Self::new(activity_type)
        }
    }

    /// A plain text reply.
    pub fn reply_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            text_format: Some("markdown".into()),
            ..self.create_reply(ActivityType::Message)
        }
    }

    /// A reply carrying a single attachment.
    pub fn reply_attachment(&self, attachment: Attachment) -> Self {
        Self {
            attachments: vec![attachment],
            ..self.create_reply(ActivityType::Message)
        }
    }

    /// A typing indicator for this conversation.
    pub fn typing(&self) -> Self {
        self.create_reply(ActivityType::Typing)
    }

    pub fn with_suggested_actions(mut self, actions: Vec<CardAction>) -> Self {
        self.suggested_actions = Some(SuggestedActions { actions });
        self
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.as_ref().map(|c| c.id.as_str())
    }

    /// Display name of the sender, if the channel provided one.
    pub fn sender_name(&self) -> Option<&str> {
        self.from.as_ref().and_then(|f| f.name.as_deref())
    }

    /// Members added, excluding the bot itself.
    pub fn added_members(&self) -> impl Iterator<Item = &ChannelAccount> {
        let bot_id = self.recipient.as_ref().map(|r| r.id.as_str());
        self.members_added
            .iter()
            .filter(move |m| Some(m.id.as_str()) != bot_id)
    }
}
