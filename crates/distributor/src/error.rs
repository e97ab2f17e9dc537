//! Distributor error types

use thiserror::Error;

use contracts::ContractError;

use crate::distributor::DistributorState;

/// Distributor-specific errors
#[derive(Debug, Error)]
pub enum DistributorError {
    /// `run` called with no registered target
    #[error("no targets registered")]
    NoTargets,

    /// `run` called with no registered source
    #[error("no sources registered")]
    NoSources,

    /// Operation not allowed in the current lifecycle state
    #[error("cannot {operation} while distributor is {state}")]
    InvalidState {
        operation: &'static str,
        state: DistributorState,
    },

    /// Built outside a tokio runtime
    #[error("distributor must be created inside a tokio runtime")]
    NoRuntime,

    /// Invalid distributor settings
    #[error("invalid distributor config: {0}")]
    Config(String),

    /// Target creation error
    #[error("failed to create target '{name}': {message}")]
    TargetCreation { name: String, message: String },

    /// A source or target failed to open during `connect`
    #[error("connect failed: {0}")]
    Connect(#[source] ContractError),

    /// Shutdown finished, but some sources or targets failed to close
    #[error("shutdown completed with {} close failure(s)", failures.len())]
    Teardown { failures: Vec<ContractError> },

    /// Contract error
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),
}

impl DistributorError {
    /// Create a target creation error
    pub fn target_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TargetCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
