//! Configuration management for teambot services.
//!
//! Configuration is populated once at startup into a typed [`Config`].
//!
//! # Configuration Priority
//!
//! Each key is resolved through a [`SecretSource`] chain:
//!
//! 1. Encrypted secret store (`TEAMBOT_SECRETS_PATH` + `TEAMBOT_SECRETS_KEY`)
//! 2. Environment variables (a `.env` file is loaded first when present)
//! 3. Default values
//!
//! # Keys
//!
//! ## Azure OpenAI
//! - `AZURE_OPENAI_ENDPOINT` → azure_openai.endpoint
//! - `AZURE_OPENAI_API_KEY` → azure_openai.api_key
//! - `AZURE_OPENAI_API_VERSION` → azure_openai.api_version
//! - `AZURE_OPENAI_DEPLOYMENT_NAME` → azure_openai.deployment_name
//!
//! ## Bot Framework
//! - `MICROSOFT_APP_ID` → bot.app_id
//! - `MICROSOFT_APP_PASSWORD` → bot.app_password
//! - `BOT_SERVICE_URL_HOSTS` → bot.allowed_service_hosts (comma separated)
//!
//! ## Conversation
//! - `MAX_CONVERSATION_HISTORY`, `OPENAI_MAX_TOKENS`, `OPENAI_TEMPERATURE`,
//!   `RATE_LIMIT_PER_MINUTE`, `MAX_RETRIES`, `REQUEST_TIMEOUT_SECS`
//!
//! ## Server / Observability
//! - `HOST`, `PORT`, `LOG_LEVEL`, `LOG_FORMAT`

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::secrets::{SecretChain, SecretSource};

// ============================================================================
// Azure OpenAI
// ============================================================================

/// Azure OpenAI connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    #[serde(default)]
    pub endpoint: String,

    /// API key sent in the `api-key` header
    #[serde(default, skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Deployment (model) name
    #[serde(default = "default_deployment_name")]
    pub deployment_name: String,
}

impl Default for AzureOpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: default_api_version(),
            deployment_name: default_deployment_name(),
        }
    }
}

impl AzureOpenAiConfig {
    /// Whether endpoint and key are both present.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }
}

fn default_api_version() -> String {
    "2024-02-15-preview".into()
}

fn default_deployment_name() -> String {
    "gpt-35-turbo".into()
}

// ============================================================================
// Bot Framework
// ============================================================================

/// Hosts Bot Framework channels post activities from.
pub const DEFAULT_SERVICE_HOSTS: &[&str] = &[
    "*.botframework.com",
    "smba.trafficmanager.net",
    "*.trafficmanager.net",
];

/// Bot Framework registration credentials.
///
/// Both fields empty means managed-identity mode: the platform authenticates
/// the bot and outbound replies are sent without a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub app_id: String,

    #[serde(default, skip_serializing)]
    pub app_password: String,

    /// Hosts replies may be sent to. `*.` entries match any subdomain.
    #[serde(default = "default_service_hosts")]
    pub allowed_service_hosts: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_password: String::new(),
            allowed_service_hosts: default_service_hosts(),
        }
    }
}

fn default_service_hosts() -> Vec<String> {
    DEFAULT_SERVICE_HOSTS.iter().map(|h| h.to_string()).collect()
}

impl BotConfig {
    /// Whether both app id and password are present.
    pub fn has_credentials(&self) -> bool {
        !self.app_id.is_empty() && !self.app_password.is_empty()
    }

    /// Whether the service runs in managed-identity mode.
    pub fn is_managed_identity(&self) -> bool {
        self.app_id.is_empty() && self.app_password.is_empty()
    }

    /// Whether replies may be sent to `host`.
    pub fn is_allowed_service_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.allowed_service_hosts.iter().any(|pattern| {
            let pattern = pattern.trim().to_ascii_lowercase();
            match pattern.strip_prefix("*.") {
                Some(suffix) => host
                    .strip_suffix(suffix)
                    .is_some_and(|rest| rest.len() > 1 && rest.ends_with('.')),
                None => host == pattern,
            }
        })
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Conversation memory and model call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum messages kept per conversation, system message included
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Outbound model calls allowed per sliding minute
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Attempts per turn before answering with the fallback apology
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP timeout for a single model call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            rate_limit_per_minute: default_rate_limit(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_history() -> usize {
    10
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_rate_limit() -> u32 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    60
}

// ============================================================================
// Server / Observability
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3978
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Config
// ============================================================================

/// Root configuration for the teambot service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub azure_openai: AzureOpenAiConfig,

    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default source chain.
    ///
    /// Reads `.env` from the working directory (if present) before resolving.
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("Failed to load .env: {e}"))),
        }

        let chain = SecretChain::from_env()?;
        Self::from_source(&chain)
    }

    /// Resolve every key through `source`, falling back to defaults.
    pub fn from_source(source: &dyn SecretSource) -> Result<Self> {
        let defaults = Self::default();

        let text = |key: &str, default: &str| -> String {
            source.get(key).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            azure_openai: AzureOpenAiConfig {
                endpoint: text("AZURE_OPENAI_ENDPOINT", &defaults.azure_openai.endpoint),
                api_key: text("AZURE_OPENAI_API_KEY", &defaults.azure_openai.api_key),
                api_version: text(
                    "AZURE_OPENAI_API_VERSION",
                    &defaults.azure_openai.api_version,
                ),
                deployment_name: text(
                    "AZURE_OPENAI_DEPLOYMENT_NAME",
                    &defaults.azure_openai.deployment_name,
                ),
            },
            bot: BotConfig {
                app_id: text("MICROSOFT_APP_ID", &defaults.bot.app_id),
                app_password: text("MICROSOFT_APP_PASSWORD", &defaults.bot.app_password),
                allowed_service_hosts: source
                    .get("BOT_SERVICE_URL_HOSTS")
                    .map(|hosts| {
                        hosts
                            .split(',')
                            .map(str::trim)
                            .filter(|h| !h.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or(defaults.bot.allowed_service_hosts),
            },
            conversation: ConversationConfig {
                max_history: parsed(
                    source,
                    "MAX_CONVERSATION_HISTORY",
                    defaults.conversation.max_history,
                )?,
                max_tokens: parsed(source, "OPENAI_MAX_TOKENS", defaults.conversation.max_tokens)?,
                temperature: parsed(
                    source,
                    "OPENAI_TEMPERATURE",
                    defaults.conversation.temperature,
                )?,
                rate_limit_per_minute: parsed(
                    source,
                    "RATE_LIMIT_PER_MINUTE",
                    defaults.conversation.rate_limit_per_minute,
                )?,
                max_retries: parsed(source, "MAX_RETRIES", defaults.conversation.max_retries)?,
                request_timeout_secs: parsed(
                    source,
                    "REQUEST_TIMEOUT_SECS",
                    defaults.conversation.request_timeout_secs,
                )?,
            },
            server: ServerConfig {
                host: text("HOST", &defaults.server.host),
                port: parsed(source, "PORT", defaults.server.port)?,
            },
            observability: ObservabilityConfig {
                log_level: text("LOG_LEVEL", &defaults.observability.log_level),
                log_format: text("LOG_FORMAT", &defaults.observability.log_format),
            },
        })
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Parse a typed value, using `default` when the key is absent or blank.
fn parsed<T>(source: &dyn SecretSource, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source.get(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {key} ({raw:?}): {e}"))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_source_empty() {
        let config = Config::from_source(&HashMap::<String, String>::new()).unwrap();

        assert_eq!(config.azure_openai.api_version, "2024-02-15-preview");
        assert_eq!(config.azure_openai.deployment_name, "gpt-35-turbo");
        assert_eq!(config.conversation.max_history, 10);
        assert_eq!(config.conversation.max_tokens, 1000);
        assert!((config.conversation.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.conversation.rate_limit_per_minute, 60);
        assert_eq!(config.conversation.max_retries, 3);
        assert_eq!(config.server.port, 3978);
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.azure_openai.is_configured());
        assert!(config.bot.is_managed_identity());
    }

    #[test]
    fn test_values_from_source() {
        let src = source(&[
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "key"),
            ("MICROSOFT_APP_ID", "app"),
            ("MICROSOFT_APP_PASSWORD", "pw"),
            ("MAX_CONVERSATION_HISTORY", "4"),
            ("OPENAI_TEMPERATURE", "1.2"),
            ("PORT", " 8080 "),
        ]);

        let config = Config::from_source(&src).unwrap();
        assert!(config.azure_openai.is_configured());
        assert!(config.bot.has_credentials());
        assert_eq!(config.conversation.max_history, 4);
        assert!((config.conversation.temperature - 1.2).abs() < f64::EPSILON);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let src = source(&[("PORT", "not-a-port")]);
        let err = Config::from_source(&src).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_blank_value_uses_default() {
        let src = source(&[("OPENAI_MAX_TOKENS", "  ")]);
        let config = Config::from_source(&src).unwrap();
        assert_eq!(config.conversation.max_tokens, 1000);
    }

    #[test]
    fn test_service_host_allowlist() {
        let bot = BotConfig::default();
        assert!(bot.is_allowed_service_host("smba.trafficmanager.net"));
        assert!(bot.is_allowed_service_host("europe.webchat.botframework.com"));
        assert!(bot.is_allowed_service_host("SMBA.TrafficManager.net"));
        assert!(!bot.is_allowed_service_host("botframework.com"));
        assert!(!bot.is_allowed_service_host("evilbotframework.com"));
        assert!(!bot.is_allowed_service_host("botframework.com.attacker.test"));
        assert!(!bot.is_allowed_service_host("127.0.0.1"));
    }

    #[test]
    fn test_service_hosts_from_source() {
        let src = source(&[("BOT_SERVICE_URL_HOSTS", "localhost, 127.0.0.1,")]);
        let config = Config::from_source(&src).unwrap();
        assert_eq!(config.bot.allowed_service_hosts, vec!["localhost", "127.0.0.1"]);
        assert!(!config.bot.is_allowed_service_host("smba.trafficmanager.net"));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let src = source(&[
            ("AZURE_OPENAI_API_KEY", "super-secret"),
            ("MICROSOFT_APP_PASSWORD", "hunter2"),
        ]);
        let config = Config::from_source(&src).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(!json.contains("hunter2"));
    }
}
