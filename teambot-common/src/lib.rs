//! Teambot Common - Shared configuration, secrets, errors and logging.
//!
//! This crate provides:
//! - Typed configuration resolved through a secret-store → env → default chain
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers
//! - Text utilities for chat input and log hygiene

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod secrets;
pub mod util;
pub mod validation;

pub use config::{
    AzureOpenAiConfig, BotConfig, Config, ConversationConfig, ObservabilityConfig, ServerConfig,
};
pub use error::{Error, Result, ResultExt};
pub use secrets::{EnvSource, SecretChain, SecretSource, SecretStore};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
    pub use crate::secrets::SecretSource;
    pub use crate::validation::{Validate, ValidationError};
}
