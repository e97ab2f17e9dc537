//! Layered error definitions
//!
//! Categorized by source: config / source / target / delivery

use thiserror::Error;

/// Unified contract error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Source Errors =====
    /// Source could not be opened
    #[error("source '{source_name}' open error: {message}")]
    SourceOpen {
        source_name: String,
        message: String,
    },

    /// Source could not be closed cleanly
    #[error("source '{source_name}' close error: {message}")]
    SourceClose {
        source_name: String,
        message: String,
    },

    /// A message callback was already registered on the source
    #[error("source '{source_name}' already has a message callback")]
    CallbackAlreadySet { source_name: String },

    // ===== Target Errors =====
    /// Target could not be opened
    #[error("target '{target_name}' open error: {message}")]
    TargetOpen {
        target_name: String,
        message: String,
    },

    /// Target could not be closed cleanly
    #[error("target '{target_name}' close error: {message}")]
    TargetClose {
        target_name: String,
        message: String,
    },

    /// Target refused or failed an inline delivery
    #[error("target '{target_name}' delivery error: {source}")]
    TargetDelivery {
        target_name: String,
        #[source]
        source: DeliveryError,
    },

    /// Target worker pool no longer accepts tasks
    #[error("target '{target_name}' worker pool is closed")]
    PoolClosed { target_name: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create source open error
    pub fn source_open(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceOpen {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create source close error
    pub fn source_close(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceClose {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create target open error
    pub fn target_open(target_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetOpen {
            target_name: target_name.into(),
            message: message.into(),
        }
    }

    /// Create target close error
    pub fn target_close(target_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetClose {
            target_name: target_name.into(),
            message: message.into(),
        }
    }

    /// Wrap a delivery failure with the target it happened on
    pub fn delivery(target_name: impl Into<String>, source: DeliveryError) -> Self {
        Self::TargetDelivery {
            target_name: target_name.into(),
            source,
        }
    }
}

/// Failure of a single delivery (`process`) call
///
/// Produced by target handlers and surfaced through the `Errored` task outcome.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Transport has no live connection
    #[error("not connected to {endpoint}")]
    NotConnected { endpoint: String },

    /// Message could not be translated into the wire format
    #[error("format error: {message}")]
    Format { message: String },

    /// The processing closure panicked
    #[error("task panicked: {message}")]
    Panicked { message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl DeliveryError {
    pub fn not_connected(endpoint: impl Into<String>) -> Self {
        Self::NotConnected {
            endpoint: endpoint.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }
}
