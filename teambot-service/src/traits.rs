//! Channel traits for delivering bot replies.

use crate::bot::activity::Activity;
use async_trait::async_trait;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Invalid activity: {0}")]
    InvalidActivity(String),
}

/// Delivers outbound activities to the conversation they address.
///
/// Implemented by [`ConnectorClient`](crate::bot::ConnectorClient) for the
/// Bot Framework REST API; tests substitute recording senders.
#[async_trait]
pub trait ActivitySender: Send + Sync {
    /// Send an activity. Routing comes from its `serviceUrl`,
    /// `conversation.id` and `replyToId`.
    async fn send(&self, activity: &Activity) -> ChannelResult<()>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sender that records every activity it is given.
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub(crate) sent: Mutex<Vec<Activity>>,
    }

    impl RecordingSender {
        pub(crate) fn sent(&self) -> Vec<Activity> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActivitySender for RecordingSender {
        async fn send(&self, activity: &Activity) -> ChannelResult<()> {
            self.sent.lock().unwrap().push(activity.clone());
            Ok(())
        }
    }

    /// Sender that always fails.
    pub(crate) struct FailingSender;

    #[async_trait]
    impl ActivitySender for FailingSender {
        async fn send(&self, _activity: &Activity) -> ChannelResult<()> {
            Err(ChannelError::Connection("connector unreachable".into()))
        }
    }

    #[test]
    fn test_error_display() {
        let err = ChannelError::SendFailed("HTTP 502".into());
        assert_eq!(err.to_string(), "Message send failed: HTTP 502");
    }
}
