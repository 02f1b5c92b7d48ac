//! Configuration validation for teambot services.
//!
//! Errors block startup. Warnings describe degraded but workable setups,
//! such as running without Bot Framework credentials.

use thiserror::Error;

use crate::config::{
    AzureOpenAiConfig, BotConfig, Config, ConversationConfig, ObservabilityConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Flatten into the individual errors.
    pub fn into_errors(self) -> Vec<ValidationError> {
        match self {
            Self::Multiple(errors) => errors.into_iter().flat_map(Self::into_errors).collect(),
            other => vec![other],
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Collapse a list of errors into a single result.
fn collect(errors: Vec<ValidationError>) -> ValidationResult<()> {
    let mut errors: Vec<_> = errors.into_iter().flat_map(ValidationError::into_errors).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.azure_openai.validate() {
            errors.push(e);
        }

        if let Err(e) = self.conversation.validate() {
            errors.push(e);
        }

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        collect(errors)
    }

    /// Non-fatal configuration issues.
    pub fn warnings(&self) -> Vec<String> {
        self.bot.warnings()
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for AzureOpenAiConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.endpoint.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "AZURE_OPENAI_ENDPOINT".into(),
            });
        } else if !self.endpoint.starts_with("https://") {
            errors.push(ValidationError::InvalidValue {
                field: "AZURE_OPENAI_ENDPOINT".into(),
                reason: "must start with https://".into(),
            });
        }

        if self.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "AZURE_OPENAI_API_KEY".into(),
            });
        }

        if self.deployment_name.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "AZURE_OPENAI_DEPLOYMENT_NAME".into(),
            });
        }

        collect(errors)
    }
}

impl Validate for ConversationConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        // The system message takes one slot; the current user turn needs another.
        if self.max_history < 2 {
            errors.push(ValidationError::InvalidValue {
                field: "MAX_CONVERSATION_HISTORY".into(),
                reason: "must be at least 2".into(),
            });
        }

        if self.max_tokens == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "OPENAI_MAX_TOKENS".into(),
                reason: "must be at least 1".into(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            errors.push(ValidationError::InvalidValue {
                field: "OPENAI_TEMPERATURE".into(),
                reason: format!("must be between 0 and 2, got {}", self.temperature),
            });
        }

        if self.rate_limit_per_minute == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "RATE_LIMIT_PER_MINUTE".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.max_retries == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "MAX_RETRIES".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.request_timeout_secs == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "REQUEST_TIMEOUT_SECS".into(),
                reason: "must be greater than 0".into(),
            });
        }

        collect(errors)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "LOG_LEVEL".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "LOG_FORMAT".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl BotConfig {
    /// Credential warnings. Missing credentials mean managed-identity mode.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.is_managed_identity() {
            warnings.push(
                "MICROSOFT_APP_ID and MICROSOFT_APP_PASSWORD are not set; \
                 running in managed-identity mode"
                    .to_string(),
            );
        } else if self.app_id.is_empty() {
            warnings.push("MICROSOFT_APP_PASSWORD is set without MICROSOFT_APP_ID".to_string());
        } else if self.app_password.is_empty() {
            warnings.push("MICROSOFT_APP_ID is set without MICROSOFT_APP_PASSWORD".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.azure_openai.endpoint = "https://example.openai.azure.com".into();
        config.azure_openai.api_key = "key".into();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_missing_model_settings() {
        let errors = Config::default().validate().unwrap_err().into_errors();
        let fields: Vec<String> = errors
            .iter()
            .filter_map(|e| match e {
                ValidationError::MissingField { field } => Some(field.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(fields, vec!["AZURE_OPENAI_ENDPOINT", "AZURE_OPENAI_API_KEY"]);
    }

    #[test]
    fn test_endpoint_must_be_https() {
        let mut config = valid_config();
        config.azure_openai.endpoint = "http://example.openai.azure.com".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "AZURE_OPENAI_ENDPOINT"
        ));
    }

    #[test]
    fn test_temperature_range() {
        let mut config = valid_config();
        config.conversation.temperature = 2.5;
        assert!(config.validate().is_err());

        config.conversation.temperature = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = valid_config();
        config.conversation.max_history = 0;
        config.conversation.rate_limit_per_minute = 0;
        config.conversation.max_retries = 0;

        let errors = config.validate().unwrap_err().into_errors();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_history_must_fit_system_and_user_message() {
        let mut config = valid_config();
        config.conversation.max_history = 1;
        assert!(matches!(
            config.validate().unwrap_err().into_errors().as_slice(),
            [ValidationError::InvalidValue { field, .. }] if field == "MAX_CONVERSATION_HISTORY"
        ));

        config.conversation.max_history = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = valid_config();
        config.observability.log_level = "verbose".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "LOG_LEVEL"
        ));
    }

    #[test]
    fn test_bot_credentials_are_warnings() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.warnings().len(), 1);

        let mut config = valid_config();
        config.bot.app_id = "app".into();
        config.bot.app_password = "pw".into();
        assert!(config.warnings().is_empty());

        config.bot.app_password.clear();
        assert!(config.warnings()[0].contains("without MICROSOFT_APP_PASSWORD"));
    }
}
