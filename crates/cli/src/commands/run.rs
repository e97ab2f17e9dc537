//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

use super::load_blueprint;

/// Execute the `run` command
pub async fn run_distributor(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)?;

    // Apply CLI overrides
    if let Some(capacity) = args.queue_capacity {
        if capacity == 0 {
            return Err(CliError::invalid_override("queue_capacity", "must be greater than 0").into());
        }
        info!(capacity, "Overriding queue capacity from CLI");
        blueprint.distributor.queue_capacity = capacity;
    }
    if let Some(delay) = args.pacing_delay {
        if !delay.is_finite() || delay < 0.0 {
            return Err(CliError::invalid_override("pacing_delay", "must be a finite number >= 0").into());
        }
        info!(delay_secs = delay, "Overriding pacing delay from CLI");
        blueprint.distributor.pacing_delay_secs = delay;
    }

    info!(
        sources = blueprint.sources.len(),
        targets = blueprint.targets.len(),
        queue_capacity = blueprint.distributor.queue_capacity,
        pacing_delay_secs = blueprint.distributor.pacing_delay_secs,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        timeout: non_zero_secs(args.timeout),
        stats_interval: non_zero_secs(args.stats_interval),
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    info!("Starting distributor...");
    let summary = pipeline
        .run(shutdown_signal())
        .await
        .context("Distributor run failed")?;

    info!(
        dispatched = summary.stats.dispatched,
        dropped = summary.dropped(),
        duration_secs = summary.duration.as_secs_f64(),
        "Distributor finished"
    );
    summary.print_summary();

    Ok(())
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::DistributorBlueprint) {
    let settings = &blueprint.distributor;
    println!("\n=== Configuration Summary ===\n");
    println!("Distributor:");
    println!("  Queue capacity: {}", settings.queue_capacity);
    println!("  Pacing delay: {}s", settings.pacing_delay_secs);
    match settings.delivery_timeout() {
        Some(limit) => println!("  Delivery timeout: {}ms", limit.as_millis()),
        None => println!("  Delivery timeout: none"),
    }

    println!("\nSources ({}):", blueprint.sources.len());
    for source in &blueprint.sources {
        println!("  - {} ({:?})", source.name, source.source_type);
    }

    println!("\nTargets ({}):", blueprint.targets.len());
    for target in &blueprint.targets {
        println!(
            "  - {} ({:?}, pool {})",
            target.name, target.target_type, target.pool_size
        );
    }

    println!();
}
