//! Distributor and worker-pool counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{DistributorStats, OutcomeKind, OutcomeStats};

/// Counters for the queue and the dispatch loop
#[derive(Debug, Default)]
pub struct DistributorMetrics {
    enqueued: AtomicU64,
    dropped_full: AtomicU64,
    rejected_shutdown: AtomicU64,
    dispatched: AtomicU64,
    delivery_failures: AtomicU64,
    delivery_timeouts: AtomicU64,
}

impl DistributorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages dropped because the queue was full
    pub fn dropped_full(&self) -> u64 {
        self.dropped_full.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_full(&self) {
        self.dropped_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages refused because shutdown was in progress
    pub fn rejected_shutdown(&self) -> u64 {
        self.rejected_shutdown.load(Ordering::Relaxed)
    }

    pub fn inc_rejected_shutdown(&self) {
        self.rejected_shutdown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    pub fn inc_delivery_failures(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_timeouts(&self) -> u64 {
        self.delivery_timeouts.load(Ordering::Relaxed)
    }

    pub fn inc_delivery_timeouts(&self) {
        self.delivery_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters plus the live gauges
    pub fn snapshot(&self, queue_len: usize, ingestion_units: usize) -> DistributorStats {
        DistributorStats {
            enqueued: self.enqueued(),
            dropped_full: self.dropped_full(),
            rejected_shutdown: self.rejected_shutdown(),
            dispatched: self.dispatched(),
            delivery_failures: self.delivery_failures(),
            delivery_timeouts: self.delivery_timeouts(),
            queue_len,
            ingestion_units,
        }
    }
}

/// Task outcome counters for one worker pool
#[derive(Debug, Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    errored: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one resolved task
    pub fn record(&self, kind: OutcomeKind) {
        let counter = match kind {
            OutcomeKind::Completed => &self.completed,
            OutcomeKind::TimedOut => &self.timed_out,
            OutcomeKind::Cancelled => &self.cancelled,
            OutcomeKind::Errored => &self.errored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OutcomeStats {
        OutcomeStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
        }
    }
}
