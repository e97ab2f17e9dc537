//! Statistics snapshots
//!
//! Plain copies of the engine's counters, handed to observability and the CLI.

use serde::Serialize;

/// Distributor counters at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DistributorStats {
    /// Messages accepted into the queue
    pub enqueued: u64,
    /// Messages dropped because the queue was full
    pub dropped_full: u64,
    /// Messages refused because shutdown was in progress
    pub rejected_shutdown: u64,
    /// Messages taken off the queue and fanned out
    pub dispatched: u64,
    /// `on_message` calls that returned an error
    pub delivery_failures: u64,
    /// `on_message` calls that exceeded the delivery timeout
    pub delivery_timeouts: u64,
    /// Messages currently queued
    pub queue_len: usize,
    /// Ingestion units still running
    pub ingestion_units: usize,
}

/// Worker-pool task outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeStats {
    pub submitted: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub errored: u64,
}

impl OutcomeStats {
    /// Tasks that have produced an outcome
    pub fn resolved(&self) -> u64 {
        self.completed + self.timed_out + self.cancelled + self.errored
    }

    /// Tasks submitted but not yet resolved
    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.resolved())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_stats_pending() {
        let stats = OutcomeStats {
            submitted: 10,
            completed: 6,
            timed_out: 1,
            cancelled: 0,
            errored: 2,
        };
        assert_eq!(stats.resolved(), 9);
        assert_eq!(stats.pending(), 1);
    }
}
