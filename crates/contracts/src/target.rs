//! DistributionTarget trait - Distributor output interface
//!
//! Defines the abstract interface for delivery endpoints.

use async_trait::async_trait;

use crate::{ContractError, DeliveryError, DisconnectCode, Message, OutcomeStats};

/// Delivery endpoint trait
///
/// All target implementations must implement this trait. The distributor
/// calls `on_message` for one target at a time, so an implementation that
/// wants concurrency must hand the work off and return quickly (see the
/// worker-pool target in the `distributor` crate).
#[async_trait]
pub trait DistributionTarget: Send + Sync {
    /// Target name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Prepare the target to receive messages
    async fn open(&self) -> Result<(), ContractError>;

    /// Accept one message
    ///
    /// Returning means the message is acknowledged; the default processes it inline.
    async fn on_message(&self, message: Message) -> Result<(), ContractError> {
        self.process(&message)
            .map_err(|e| ContractError::delivery(self.name(), e))
    }

    /// Synchronous, side-effecting delivery of one message
    fn process(&self, message: &Message) -> Result<(), DeliveryError>;

    /// Release the target
    async fn close(&self, code: DisconnectCode, reason: &str) -> Result<(), ContractError>;

    /// Task outcome counters, for targets that process messages in the background
    fn outcome_stats(&self) -> Option<OutcomeStats> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingTarget {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DistributionTarget for RecordingTarget {
        fn name(&self) -> &str {
            "recording"
        }

        async fn open(&self) -> Result<(), ContractError> {
            Ok(())
        }

        fn process(&self, message: &Message) -> Result<(), DeliveryError> {
            if message.is_empty() {
                return Err(DeliveryError::Other("empty".into()));
            }
            self.seen.lock().unwrap().push(message.to_string());
            Ok(())
        }

        async fn close(&self, _code: DisconnectCode, _reason: &str) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_on_message_processes_inline() {
        let target = RecordingTarget {
            seen: Mutex::new(Vec::new()),
        };

        target.on_message(Message::from("one")).await.unwrap();
        let err = target.on_message(Message::from("")).await.unwrap_err();

        assert!(matches!(err, ContractError::TargetDelivery { .. }));
        assert_eq!(*target.seen.lock().unwrap(), vec!["one".to_string()]);
        assert!(target.outcome_stats().is_none());
    }
}
