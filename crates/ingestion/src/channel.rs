//! ChannelSource - in-process push handle
//!
//! Lets code embedding the distributor hand it messages directly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use contracts::{
    CallbackSlot, ContractError, DisconnectCode, DistributionSource, Message, MessageCallback,
};
use tracing::{debug, trace};

use crate::{emit, mark_open};

/// Source fed by [`push`](ChannelSource::push)
pub struct ChannelSource {
    name: String,
    slot: CallbackSlot,
    open: AtomicBool,
    pushed: AtomicU64,
}

impl ChannelSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: CallbackSlot::new(),
            open: AtomicBool::new(false),
            pushed: AtomicU64::new(0),
        }
    }

    /// Hand a message to the distributor
    ///
    /// Returns `false`, dropping the message, when the source is not open or
    /// no callback is registered.
    pub fn push(&self, message: impl Into<Message>) -> bool {
        if !self.is_open() {
            trace!(source_name = %self.name, "push on closed source ignored");
            return false;
        }
        let Some(callback) = self.slot.get() else {
            return false;
        };
        emit(&self.name, &callback, message.into());
        self.pushed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Messages accepted by `push`
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }
}

impl DistributionSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), ContractError> {
        mark_open(&self.name, &self.open)?;
        debug!(source_name = %self.name, "ChannelSource opened");
        Ok(())
    }

    fn set_on_message(&self, callback: MessageCallback) -> Result<(), ContractError> {
        self.slot.set(&self.name, callback)
    }

    fn close(&self, code: DisconnectCode, reason: &str) -> Result<(), ContractError> {
        self.open.store(false, Ordering::SeqCst);
        debug!(source_name = %self.name, %code, reason, pushed = self.pushed(), "ChannelSource closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_push_only_while_open() {
        let source = ChannelSource::new("embedded");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        source
            .set_on_message(Arc::new(move |m: Message| sink.lock().unwrap().push(m.to_string())))
            .unwrap();

        assert!(!source.push("before open"));
        source.open().unwrap();
        assert!(source.push("hello"));
        assert!(source.push(String::from("world")));
        source.close(DisconnectCode::SHUTDOWN, "").unwrap();
        assert!(!source.push("after close"));

        assert_eq!(*seen.lock().unwrap(), vec!["hello", "world"]);
        assert_eq!(source.pushed(), 2);
    }

    #[test]
    fn test_push_without_callback() {
        let source = ChannelSource::new("orphan");
        source.open().unwrap();
        assert!(!source.push("lost"));
    }
}
