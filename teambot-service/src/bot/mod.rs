//! Bot Framework integration: activity schema, cards, handler and connector.

pub mod activity;
pub mod cards;
pub mod connector;
pub mod handler;

pub use activity::{Activity, ActivityType, Attachment, CardAction, ChannelAccount, ConversationAccount};
pub use connector::ConnectorClient;
pub use handler::TeamsBot;
