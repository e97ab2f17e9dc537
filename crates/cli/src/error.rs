//! Error types for CLI operations.

use distributor::DistributorError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration loading or validation error
    #[error("Failed to load configuration from {path}: {message}")]
    ConfigLoad { path: String, message: String },

    /// Invalid command-line override
    #[error("Invalid override for {field}: {message}")]
    InvalidOverride { field: &'static str, message: String },

    /// Source construction error
    #[error("Failed to create source '{name}': {message}")]
    SourceCreation { name: String, message: String },

    /// Distributor error
    #[error(transparent)]
    Distributor(#[from] DistributorError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_override(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOverride {
            field,
            message: message.into(),
        }
    }

    pub fn source_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
