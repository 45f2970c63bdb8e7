//! Configuration error type.

use thiserror::Error;

/// Errors produced while loading or validating instance configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid configuration option: {0}")]
    InvalidOption(String),
}

impl ConfigError {
    /// Creates an invalid-option error with a message.
    pub fn invalid_option(msg: impl Into<String>) -> Self {
        ConfigError::InvalidOption(msg.into())
    }
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
