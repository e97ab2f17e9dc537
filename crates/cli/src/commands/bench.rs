//! `bench` command implementation.
//!
//! Pushes messages from an in-process source through the distributor into a
//! pooled target that only simulates work, and reports how long the pool took to
//! resolve every task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use contracts::{DeliveryError, Message, OutcomeStats};
use distributor::{
    DistributorBuilder, DistributorConfig, TaskHandler, WorkerPoolConfig, WorkerPoolTarget,
};
use ingestion::ChannelSource;

use crate::cli::BenchArgs;
use crate::error::CliError;

/// Pooled handler that only simulates work; the pool counts outcomes
struct SleepHandler {
    work: Duration,
}

impl TaskHandler for SleepHandler {
    type Output = ();

    fn name(&self) -> &str {
        "bench"
    }

    fn process(&self, _message: &Message) -> Result<(), DeliveryError> {
        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }
        Ok(())
    }

    fn on_complete(&self, _output: ()) {}
}

#[derive(Debug, Serialize)]
struct BenchReport {
    messages: u64,
    pool_size: usize,
    work_ms: u64,
    elapsed_ms: f64,
    messages_per_sec: f64,
    dropped: u64,
    outcomes: OutcomeStats,
}

/// Execute the `bench` command
pub async fn run_bench(args: &BenchArgs) -> Result<()> {
    let report = bench(args).await?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize bench report")?;
        println!("{}", json);
    } else {
        println!("\n=== Bench Report ===\n");
        println!("Messages: {} (dropped {})", report.messages, report.dropped);
        println!("Pool size: {}", report.pool_size);
        println!("Work per message: {}ms", report.work_ms);
        println!("Elapsed: {:.2}ms", report.elapsed_ms);
        println!("Throughput: {:.1} msg/s", report.messages_per_sec);
        let o = &report.outcomes;
        println!(
            "Outcomes: completed={} timed_out={} cancelled={} errored={}",
            o.completed, o.timed_out, o.cancelled, o.errored
        );
        println!();
    }
    Ok(())
}

async fn bench(args: &BenchArgs) -> Result<BenchReport> {
    if args.pool_size == 0 {
        return Err(CliError::invalid_override("pool_size", "must be greater than 0").into());
    }

    let mut pool = WorkerPoolConfig::new(args.pool_size);
    if args.task_timeout_ms > 0 {
        pool = pool.with_task_timeout(Duration::from_millis(args.task_timeout_ms));
    }

    let source = Arc::new(ChannelSource::new("bench"));
    let target = Arc::new(WorkerPoolTarget::new(
        SleepHandler {
            work: Duration::from_millis(args.work_ms),
        },
        pool,
    ));

    let config = DistributorConfig {
        pacing_delay: Duration::ZERO,
        queue_capacity: usize::try_from(args.messages).unwrap_or(usize::MAX).max(1),
        delivery_timeout: None,
        ..Default::default()
    };
    let distributor = Arc::new(
        DistributorBuilder::new(config)
            .source(source.clone())
            .target(target.clone())
            .build()?,
    );
    distributor.connect().await?;

    let runner = {
        let distributor = Arc::clone(&distributor);
        tokio::spawn(async move { distributor.run().await })
    };

    info!(messages = args.messages, pool_size = args.pool_size, "Bench started");
    let started = Instant::now();
    for n in 0..args.messages {
        source.push(format!("bench message {n}"));
    }

    let deadline = started + Duration::from_secs(args.deadline);
    loop {
        let stats = target.pool().stats();
        let settled = distributor.stats();
        let accounted = stats.resolved() + settled.dropped_full + settled.rejected_shutdown;
        if accounted >= args.messages {
            break;
        }
        if Instant::now() >= deadline {
            warn!(resolved = stats.resolved(), "Bench deadline reached before every task resolved");
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let elapsed = started.elapsed();

    distributor.shutdown().await?;
    runner.await.context("Dispatch task failed")??;

    let stats = distributor.stats();
    let outcomes = target.pool().stats();
    let secs = elapsed.as_secs_f64();
    Ok(BenchReport {
        messages: args.messages,
        pool_size: args.pool_size,
        work_ms: args.work_ms,
        elapsed_ms: secs * 1000.0,
        messages_per_sec: if secs > 0.0 {
            outcomes.completed as f64 / secs
        } else {
            0.0
        },
        dropped: stats.dropped_full + stats.rejected_shutdown,
        outcomes,
    })
}
