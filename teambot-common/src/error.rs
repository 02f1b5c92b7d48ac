//! Error types for teambot services.

use thiserror::Error;

/// Result type alias using the teambot error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for teambot services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Secret storage error
    #[error("Secret store error: {0}")]
    Secret(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this is a client-side input error.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::InvalidInput(_) => true,
            Self::WithContext { source, .. } => source.is_invalid_input(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_invalid_input() {
        assert!(Error::InvalidInput("test".into()).is_invalid_input());
        assert!(!Error::Config("test".into()).is_invalid_input());
        assert!(!Error::Secret("test".into()).is_invalid_input());
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::InvalidInput("empty message".into());
        let with_ctx = err.with_context("parsing chat request");
        assert!(matches!(with_ctx, Error::WithContext { .. }));
        assert!(with_ctx.is_invalid_input());
        assert_eq!(
            with_ctx.to_string(),
            "parsing chat request: Invalid input: empty message"
        );
    }

    #[test]
    fn test_result_ext_wraps_io_error() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = res.context("reading secrets").unwrap_err();
        assert!(err.to_string().starts_with("reading secrets: IO error"));
    }
}
