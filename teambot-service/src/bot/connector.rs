//! Bot Framework Connector client for outbound replies.
//!
//! Replies are posted to
//! `{serviceUrl}/v3/conversations/{conversationId}/activities/{replyToId}`.
//! With app credentials configured, each request carries a client-credentials
//! bearer token that is cached until shortly before it expires. Without
//! credentials (managed-identity mode) requests go out unauthenticated.
//!
//! Replies are only sent to `serviceUrl` hosts on the configured allowlist.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

use super::activity::Activity;
use crate::traits::{ActivitySender, ChannelError, ChannelResult};
use teambot_common::config::BotConfig;

/// Bot Framework token endpoint.
pub const BOT_FRAMEWORK_TOKEN_URL: &str =
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";

const BOT_FRAMEWORK_SCOPE: &str = "https://api.botframework.com/.default";

/// Refresh the token this long before it expires.
const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct TokenCache {
    token: String,
    expires_at: Instant,
}

struct Credentials {
    app_id: String,
    app_password: String,
}

/// HTTP client for the Bot Framework Connector REST API.
pub struct ConnectorClient {
    client: reqwest::Client,
    credentials: Option<Credentials>,
    config: BotConfig,
    token_url: String,
    token_cache: Arc<RwLock<Option<TokenCache>>>,
}

impl ConnectorClient {
    /// Create a client from bot configuration.
    pub fn new(config: &BotConfig) -> Self {
        let credentials = config.has_credentials().then(|| Credentials {
            app_id: config.app_id.clone(),
            app_password: config.app_password.clone(),
        });

        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            credentials,
            config: config.clone(),
            token_url: BOT_FRAMEWORK_TOKEN_URL.to_string(),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Override the token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Endpoint an activity should be posted to.
    pub fn activity_url(activity: &Activity) -> ChannelResult<Url> {
        let service_url = activity
            .service_url
            .as_deref()
            .ok_or_else(|| ChannelError::InvalidActivity("missing serviceUrl".into()))?;
        let conversation_id = activity
            .conversation_id()
            .ok_or_else(|| ChannelError::InvalidActivity("missing conversation id".into()))?;

        let mut url = Url::parse(service_url)
            .map_err(|e| ChannelError::InvalidActivity(format!("invalid serviceUrl: {e}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ChannelError::InvalidActivity("serviceUrl cannot be a base".into())
            })?;
            segments
                .pop_if_empty()
                .extend(["v3", "conversations", conversation_id, "activities"]);
            if let Some(reply_to) = activity.reply_to_id.as_deref() {
                segments.push(reply_to);
            }
        }
        Ok(url)
    }

    /// Reject endpoints outside the service host allowlist.
    fn check_service_host(&self, url: &Url) -> ChannelResult<()> {
        match url.host_str() {
            Some(host) if self.config.is_allowed_service_host(host) => Ok(()),
            host => Err(ChannelError::InvalidActivity(format!(
                "serviceUrl host {} is not an allowed Bot Framework host",
                host.unwrap_or("<none>")
            ))),
        }
    }

    /// Get a bearer token, refreshing the cache when needed.
    ///
    /// Returns `None` in managed-identity mode.
    async fn access_token(&self) -> ChannelResult<Option<String>> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        // Check cache first
        {
            let cache = self.token_cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.expires_at > Instant::now() + Duration::from_secs(TOKEN_REFRESH_MARGIN_SECS)
                {
                    return Ok(Some(cached.token.clone()));
                }
            }
        }

        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.app_id.as_str()),
                ("client_secret", credentials.app_password.as_str()),
                ("scope", BOT_FRAMEWORK_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| ChannelError::Connection(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!(
                "Failed to get Bot Framework token ({status}): {text}"
            )));
        }

        let data: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::Auth(format!("invalid token response: {e}")))?;

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(TokenCache {
                token: data.access_token.clone(),
                expires_at: Instant::now() + Duration::from_secs(data.expires_in),
            });
        }

        tracing::debug!(
            expires_in = data.expires_in,
            "Bot Framework access token refreshed"
        );
        Ok(Some(data.access_token))
    }
}

#[async_trait]
impl ActivitySender for ConnectorClient {
    async fn send(&self, activity: &Activity) -> ChannelResult<()> {
        let url = Self::activity_url(activity)?;
        self.check_service_host(&url)?;

        let mut request = self.client.post(url.clone()).json(activity);
        if let Some(token) = self.access_token().await? {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed(format!("HTTP {status}: {text}")));
        }

        tracing::debug!(
            url = %url,
            activity_type = ?activity.activity_type,
            "Activity sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::activity::{ActivityType, ConversationAccount};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Bot config that accepts the local mock server as a service host.
    fn local_config(app_id: &str, app_password: &str) -> BotConfig {
        BotConfig {
            app_id: app_id.into(),
            app_password: app_password.into(),
            allowed_service_hosts: vec!["127.0.0.1".into()],
        }
    }

    fn reply_for(server: &MockServer) -> Activity {
        Activity {
            service_url: Some(format!("{}/amer/", server.uri())),
            conversation: Some(ConversationAccount {
                id: "19:abc@thread.v2".into(),
                ..Default::default()
            }),
            reply_to_id: Some("act-1".into()),
            text: Some("hi".into()),
            ..Activity::new(ActivityType::Message)
        }
    }

    #[test]
    fn test_activity_url() {
        let activity = Activity {
            service_url: Some("https://smba.trafficmanager.net/amer/".into()),
            conversation: Some(ConversationAccount {
                id: "a:1".into(),
                ..Default::default()
            }),
            reply_to_id: Some("r1".into()),
            ..Activity::new(ActivityType::Message)
        };
        let url = ConnectorClient::activity_url(&activity).unwrap();
        assert_eq!(
            url.as_str(),
            "https://smba.trafficmanager.net/amer/v3/conversations/a:1/activities/r1"
        );

        let activity = Activity {
            reply_to_id: None,
            ..activity
        };
        let url = ConnectorClient::activity_url(&activity).unwrap();
        assert!(url.as_str().ends_with("/v3/conversations/a:1/activities"));
    }

    #[test]
    fn test_activity_url_requires_routing() {
        let activity = Activity::new(ActivityType::Message);
        assert!(matches!(
            ConnectorClient::activity_url(&activity),
            Err(ChannelError::InvalidActivity(_))
        ));
    }

    #[tokio::test]
    async fn test_send_without_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/amer/v3/conversations/19:abc@thread.v2/activities/act-1"))
            .and(body_partial_json(json!({"type": "message", "text": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "out-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ConnectorClient::new(&local_config("", ""));
        assert!(!client.is_authenticated());
        client.send(&reply_for(&server)).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_with_cached_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3600,
                "access_token": "tok-123"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/amer/v3/conversations/19:abc@thread.v2/activities/act-1"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let config = local_config("app-id", "secret");
        let client = ConnectorClient::new(&config).with_token_url(format!("{}/token", server.uri()));

        client.send(&reply_for(&server)).await.unwrap();
        client.send(&reply_for(&server)).await.unwrap();
    }

    #[tokio::test]
    async fn test_token_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad secret"))
            .mount(&server)
            .await;

        let config = local_config("app-id", "wrong");
        let client = ConnectorClient::new(&config).with_token_url(format!("{}/token", server.uri()));

        let err = client.send(&reply_for(&server)).await.unwrap_err();
        assert!(matches!(err, ChannelError::Auth(_)));
    }

    #[tokio::test]
    async fn test_send_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = ConnectorClient::new(&local_config("", ""));
        let err = client.send(&reply_for(&server)).await.unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed(ref msg) if msg.contains("502")));
    }

    #[tokio::test]
    async fn test_unlisted_service_host_never_gets_token() {
        let token_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "expires_in": 3600,
                "access_token": "SECRET-BOT-TOKEN"
            })))
            .expect(0)
            .mount(&token_server)
            .await;

        let attacker = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&attacker)
            .await;

        // Default allowlist only covers Bot Framework hosts.
        let config = BotConfig {
            app_id: "app-id".into(),
            app_password: "secret".into(),
            ..Default::default()
        };
        let client =
            ConnectorClient::new(&config).with_token_url(format!("{}/token", token_server.uri()));

        let err = client.send(&reply_for(&attacker)).await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidActivity(ref msg) if msg.contains("127.0.0.1")));
    }
}
