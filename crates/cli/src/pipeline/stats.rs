//! Run statistics.

use std::time::Duration;

use contracts::{DistributorStats, OutcomeStats};
use distributor::Distributor;

/// Statistics from a distributor run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Total duration of the run
    pub duration: Duration,

    /// Distributor counters after shutdown
    pub stats: DistributorStats,

    /// Outcome counters per target; `None` for inline targets
    pub targets: Vec<(String, Option<OutcomeStats>)>,
}

impl RunSummary {
    pub fn collect(distributor: &Distributor, duration: Duration) -> Self {
        Self {
            duration,
            stats: distributor.stats(),
            targets: distributor.target_stats(),
        }
    }

    /// Messages that never reached the queue
    pub fn dropped(&self) -> u64 {
        self.stats.dropped_full + self.stats.rejected_shutdown
    }

    /// Dispatched messages per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.stats.dispatched as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                   Distributor Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let stats = &self.stats;
        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Enqueued: {}", stats.enqueued);
        println!("   ├─ Dispatched: {}", stats.dispatched);
        println!("   ├─ Throughput: {:.2} msg/s", self.throughput());
        println!("   ├─ Dropped (queue full): {}", stats.dropped_full);
        println!("   ├─ Rejected (shutdown): {}", stats.rejected_shutdown);
        println!("   ├─ Delivery failures: {}", stats.delivery_failures);
        println!("   └─ Delivery timeouts: {}", stats.delivery_timeouts);

        println!("\n📤 Targets");
        for (i, (name, outcomes)) in self.targets.iter().enumerate() {
            let prefix = if i == self.targets.len() - 1 { "└─" } else { "├─" };
            match outcomes {
                Some(o) => println!(
                    "   {} {}: submitted={} completed={} timed_out={} cancelled={} errored={}",
                    prefix, name, o.submitted, o.completed, o.timed_out, o.cancelled, o.errored
                ),
                None => println!("   {} {}: inline", prefix, name),
            }
        }

        println!();
    }
}
