//! Adaptive cards sent by the bot.

use serde_json::{json, Value};

use super::activity::{Attachment, CardAction};
use crate::message::ConversationSummary;

pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

const COMMANDS_TEXT: &str = "• `/help` - Show this help message\n\
                             • `/clear` - Clear conversation history\n\
                             • `/summary` - Show conversation summary";

/// Wrap an adaptive card body as an attachment.
pub fn adaptive_card(card: Value) -> Attachment {
    Attachment {
        content_type: ADAPTIVE_CARD_CONTENT_TYPE.to_string(),
        content: card,
    }
}

fn section_heading(text: &str) -> Value {
    json!({
        "type": "TextBlock",
        "text": text,
        "weight": "Bolder",
        "spacing": "Medium"
    })
}

fn paragraph(text: &str) -> Value {
    json!({
        "type": "TextBlock",
        "text": text,
        "wrap": true
    })
}

/// Greeting for a member who joined the conversation.
pub fn welcome_card(user_name: Option<&str>) -> Attachment {
    let greeting = match user_name {
        Some(name) if !name.is_empty() => format!("👋 Hello {name}! I'm your AI assistant."),
        _ => "👋 Hello! I'm your AI assistant.".to_string(),
    };

    adaptive_card(json!({
        "type": "AdaptiveCard",
        "version": "1.0",
        "body": [
            {
                "type": "TextBlock",
                "text": greeting,
                "size": "Medium",
                "weight": "Bolder"
            },
            paragraph(
                "I can help you with various tasks, answer questions, and have conversations. \
                 Just type your message and I'll respond!"
            ),
            section_heading("**Available Commands:**"),
            paragraph(COMMANDS_TEXT)
        ]
    }))
}

/// Quick replies offered after the welcome card.
pub fn welcome_actions() -> Vec<CardAction> {
    vec![
        CardAction::im_back("Get Help", "/help"),
        CardAction::im_back("Start Conversation", "Hello! How can you help me today?"),
    ]
}

pub fn help_card() -> Attachment {
    adaptive_card(json!({
        "type": "AdaptiveCard",
        "version": "1.0",
        "body": [
            {
                "type": "TextBlock",
                "text": "🤖 AI Assistant Help",
                "size": "Large",
                "weight": "Bolder"
            },
            paragraph("I'm an AI-powered chatbot that can help you with various tasks:"),
            section_heading("**What I can do:**"),
            paragraph(
                "• Answer questions on a wide range of topics\n\
                 • Help with writing and editing\n\
                 • Provide explanations and tutorials\n\
                 • Assist with problem-solving\n\
                 • Have natural conversations"
            ),
            section_heading("**Available Commands:**"),
            paragraph(COMMANDS_TEXT),
            section_heading("**Tips:**"),
            paragraph(
                "• Be specific with your questions for better responses\n\
                 • I remember our conversation context\n\
                 • Feel free to ask follow-up questions"
            )
        ]
    }))
}

/// Fact sheet for `/summary`.
pub fn summary_card(summary: &ConversationSummary) -> Attachment {
    let participants = if summary.participants.is_empty() {
        "Unknown".to_string()
    } else {
        summary.participants.join(", ")
    };

    adaptive_card(json!({
        "type": "AdaptiveCard",
        "version": "1.0",
        "body": [
            {
                "type": "TextBlock",
                "text": "📊 Conversation Summary",
                "size": "Large",
                "weight": "Bolder"
            },
            {
                "type": "FactSet",
                "facts": [
                    {"title": "Total Messages:", "value": summary.message_count.to_string()},
                    {"title": "Your Messages:", "value": summary.user_messages.to_string()},
                    {"title": "AI Responses:", "value": summary.assistant_messages.to_string()},
                    {"title": "Participants:", "value": participants}
                ]
            }
        ]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_card_greeting() {
        let card = welcome_card(Some("Ada"));
        assert_eq!(card.content_type, ADAPTIVE_CARD_CONTENT_TYPE);
        assert_eq!(
            card.content["body"][0]["text"],
            "👋 Hello Ada! I'm your AI assistant."
        );

        let card = welcome_card(None);
        assert_eq!(card.content["body"][0]["text"], "👋 Hello! I'm your AI assistant.");
    }

    #[test]
    fn test_help_card_lists_commands() {
        let card = help_card();
        let body = card.content["body"].as_array().unwrap();
        assert!(body
            .iter()
            .any(|block| block["text"].as_str().unwrap_or("").contains("/clear")));
    }

    #[test]
    fn test_summary_card_facts() {
        let summary = ConversationSummary {
            message_count: 2,
            user_messages: 1,
            assistant_messages: 1,
            participants: vec!["Ada".into(), "Bob".into()],
            ..Default::default()
        };

        let card = summary_card(&summary);
        let facts = &card.content["body"][1]["facts"];
        assert_eq!(facts[0]["value"], "2");
        assert_eq!(facts[3]["value"], "Ada, Bob");

        let card = summary_card(&ConversationSummary::default());
        assert_eq!(card.content["body"][1]["facts"][3]["value"], "Unknown");
    }

    #[test]
    fn test_welcome_actions() {
        let actions = welcome_actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].value, "/help");
    }
}
