//! Error types for configuration loading and validation.

use thiserror::Error;

/// Result alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The underlying configuration sources could not be read or merged.
    #[error("failed to load configuration")]
    Load {
        /// Underlying loader error.
        #[source]
        source: config::ConfigError,
    },
    /// A required setting was missing or empty.
    #[error("missing required setting")]
    MissingField {
        /// Dotted key of the missing setting.
        field: &'static str,
    },
    /// A setting carried a value that cannot be used.
    #[error("invalid setting value")]
    InvalidValue {
        /// Dotted key of the offending setting.
        field: &'static str,
        /// Value as provided.
        value: String,
    },
}

impl From<config::ConfigError> for ConfigError {
    fn from(source: config::ConfigError) -> Self {
        Self::Load { source }
    }
}
