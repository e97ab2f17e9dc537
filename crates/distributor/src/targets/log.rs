//! LogTarget - logs each message via tracing

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use contracts::{ContractError, DeliveryError, DisconnectCode, DistributionTarget, Message};
use tracing::{info, instrument};

/// Longest message prefix included in the log line
const PREVIEW_CHARS: usize = 120;

/// Target that logs message summaries for debugging
///
/// Processes inline: logging is cheap enough to run on the dispatch loop.
pub struct LogTarget {
    name: String,
    received: AtomicU64,
}

impl LogTarget {
    /// Create a new LogTarget with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            received: AtomicU64::new(0),
        }
    }

    /// Messages logged so far
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

fn preview(message: &str) -> &str {
    match message.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => &message[..end],
        None => message,
    }
}

#[async_trait]
impl DistributionTarget for LogTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<(), ContractError> {
        info!(target_name = %self.name, "LogTarget opened");
        Ok(())
    }

    #[instrument(name = "log_target_process", skip(self, message), fields(target_name = %self.name))]
    fn process(&self, message: &Message) -> Result<(), DeliveryError> {
        let seq = self.received.fetch_add(1, Ordering::Relaxed) + 1;
        info!(seq, len = message.len(), preview = preview(message), "Message received");
        Ok(())
    }

    async fn close(&self, code: DisconnectCode, reason: &str) -> Result<(), ContractError> {
        info!(
            target_name = %self.name,
            received = self.received(),
            %code,
            reason,
            "LogTarget closed"
        );
        Ok(())
    }
}
