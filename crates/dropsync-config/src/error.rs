//! Error types for configuration management

use dropsync_types::Error as DropsyncError;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading configuration file
    #[error("I/O error reading config file '{path}': {source}")]
    Io {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// Invalid configuration value
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// The token file does not exist
    #[error("Access token file not found: {path}")]
    MissingToken {
        /// Where the token was expected
        path: PathBuf,
    },

    /// The token file exists but holds no token
    #[error("Access token file is empty: {path}")]
    EmptyToken {
        /// The empty token file
        path: PathBuf,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Generic configuration error
    #[error("Configuration error: {message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        Self::Other {
            message: error.to_string(),
        }
    }
}

impl From<ConfigError> for DropsyncError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::MissingToken { .. } | ConfigError::EmptyToken { .. } => {
                DropsyncError::auth(error.to_string())
            }
            other => DropsyncError::config(other.to_string()),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new invalid value error
    pub fn invalid_value<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether the error is about the access token rather than the settings
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::MissingToken { .. } | Self::EmptyToken { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropsync_types::ErrorKind;

    #[test]
    fn test_token_errors_map_to_auth() {
        let err: DropsyncError = ConfigError::MissingToken {
            path: PathBuf::from(".dropbox_token"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Auth);

        let err: DropsyncError = ConfigError::validation("bad").into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
