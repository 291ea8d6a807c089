//! Core error types for adwatch.
//!
//! [`AdwatchError`] is what configuration resolution and value parsing
//! return. Storage has its own [`StorageError`] because the controller
//! swallows it rather than propagating it.

use thiserror::Error;

/// Central error type for adwatch operations.
#[derive(Error, Debug)]
pub enum AdwatchError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (unknown method, policy or choice names)
    #[error("validation error: {0}")]
    Validation(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Errors raised by a [`KeyValueStore`](crate::storage::KeyValueStore).
///
/// The detection controller treats every variant as "key absent".
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store refused access (private browsing, quota, closed page)
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// I/O error on a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error on a file-backed store
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using `AdwatchError`.
pub type Result<T> = std::result::Result<T, AdwatchError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdwatchError::Validation("empty path".to_string());
        assert_eq!(err.to_string(), "validation error: empty path");

        let err = ConfigError::NoConfigDir;
        assert_eq!(
            err.to_string(),
            "could not determine config directory (XDG base directories not available)"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let err: AdwatchError = config_err.into();
        assert!(matches!(err, AdwatchError::Config(_)));
    }
}
