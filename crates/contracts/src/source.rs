//! DistributionSource trait - ingestion endpoint abstraction
//!
//! Defines the interface every message producer implements, decoupling
//! the distributor from concrete transports (sockets, generators, channels).

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::{ContractError, Message};

/// Message callback type
///
/// When a source produces a message, it hands the `Message` to this callback.
/// Uses `Arc` so the callback can be shared with the source's background threads.
pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Disconnect code passed to `close`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisconnectCode(pub i32);

impl DisconnectCode {
    /// No particular reason
    pub const UNSPECIFIED: Self = Self(-1);

    /// Close initiated by the distributor's shutdown protocol
    pub const SHUTDOWN: Self = Self(1001);

    /// Raw code value
    pub fn code(self) -> i32 {
        self.0
    }
}

impl Default for DisconnectCode {
    fn default() -> Self {
        Self::SHUTDOWN
    }
}

impl fmt::Display for DisconnectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message source trait
///
/// Sources produce messages asynchronously once opened and report each one
/// through the single callback registered with [`set_on_message`].
///
/// # Example
///
/// ```ignore
/// let source: Arc<dyn DistributionSource> = Arc::new(MockSource::new("mock", config));
/// source.set_on_message(Arc::new(|message| {
///     println!("received: {message}");
/// }))?;
/// source.open()?;
/// // ... later ...
/// source.close(DisconnectCode::SHUTDOWN, "done")?;
/// ```
///
/// [`set_on_message`]: DistributionSource::set_on_message
pub trait DistributionSource: Send + Sync {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Start producing messages
    fn open(&self) -> Result<(), ContractError>;

    /// Register the message callback
    ///
    /// At most one callback may be registered; a second call fails with
    /// [`ContractError::CallbackAlreadySet`].
    fn set_on_message(&self, callback: MessageCallback) -> Result<(), ContractError>;

    /// Stop producing messages
    fn close(&self, code: DisconnectCode, reason: &str) -> Result<(), ContractError>;

    /// Check if the source is currently producing
    fn is_open(&self) -> bool;
}

/// Write-once holder for a source's message callback
#[derive(Default)]
pub struct CallbackSlot {
    callback: OnceLock<MessageCallback>,
}

impl CallbackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the callback, rejecting a second registration
    pub fn set(&self, source_name: &str, callback: MessageCallback) -> Result<(), ContractError> {
        self.callback
            .set(callback)
            .map_err(|_| ContractError::CallbackAlreadySet {
                source_name: source_name.to_string(),
            })
    }

    /// Clone the registered callback, if any
    pub fn get(&self) -> Option<MessageCallback> {
        self.callback.get().cloned()
    }

    /// Deliver a message to the callback
    ///
    /// Returns false when no callback is registered (message discarded).
    pub fn emit(&self, message: Message) -> bool {
        match self.callback.get() {
            Some(callback) => {
                callback(message);
                true
            }
            None => false,
        }
    }

    pub fn is_set(&self) -> bool {
        self.callback.get().is_some()
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("is_set", &self.is_set())
            .finish()
    }
}
