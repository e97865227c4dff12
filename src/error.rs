//! Error type for the `telemetry-pclog` application layer.
//!
//! `AppError` covers failures that stop the program before or around the
//! client core: unreadable configuration files, values that parse but make no
//! sense, and logging setup. Connection trouble at runtime is not an error at
//! this level; the client logs it and keeps going per the retry policy.
//!
//! - **`Config`**: Figment could not merge or extract the configuration.
//! - **`Configuration`**: a value passed parsing but is semantically invalid.
//! - **`Client`**: the client core rejected the derived [`ClientConfig`].
//! - **`Logging`**: the tracing subscriber could not be installed.
//!
//! [`ClientConfig`]: telemetry_client::ClientConfig

use telemetry_client::ClientError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application-level failures
#[derive(Error, Debug)]
pub enum AppError {
    /// Figment extraction failure
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Semantically invalid configuration
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Rejected by the client core
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Subscriber installation failure
    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_pass_through() {
        let err: AppError = ClientError::Config("attempts must be at least 1".into()).into();
        assert!(matches!(err, AppError::Client(_)));
        assert!(err.to_string().contains("attempts must be at least 1"));
    }

    #[test]
    fn test_configuration_message() {
        let err = AppError::Configuration("bad port".into());
        assert_eq!(err.to_string(), "Configuration validation error: bad port");
    }
}
