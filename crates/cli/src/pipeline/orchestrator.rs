//! Pipeline orchestrator - builds sources and targets from a blueprint and
//! drives the distributor through its lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::DistributorBlueprint;
use distributor::{create_distributor, Distributor, DistributorState};
use observability::{record_distributor_stats, record_outcome_stats, ThroughputTracker};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::CliError;

use super::RunSummary;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated distributor blueprint
    pub blueprint: DistributorBlueprint,

    /// Stop after this long (None = until signalled)
    pub timeout: Option<Duration>,

    /// Interval between statistics reports (None = disabled)
    pub stats_interval: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Create targets and sources and register them on a new distributor
    pub fn build_distributor(&self) -> crate::error::Result<Distributor> {
        let blueprint = &self.config.blueprint;
        let mut distributor = create_distributor(&blueprint.distributor, &blueprint.targets)?;

        for source_config in &blueprint.sources {
            let source = ingestion::create_source(source_config)
                .map_err(|e| CliError::source_creation(&source_config.name, e.to_string()))?;
            distributor.add_source(source)?;
        }

        info!(
            sources = distributor.source_count(),
            targets = distributor.target_count(),
            "Distributor built"
        );
        Ok(distributor)
    }

    /// Run until `shutdown` resolves or the timeout expires, then shut down
    pub async fn run<F>(self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let distributor = Arc::new(self.build_distributor()?);

        if let Err(e) = distributor.connect().await {
            warn!(error = %e, "Connect failed, closing whatever was opened");
            if let Err(close_error) = distributor.shutdown().await {
                warn!(error = %close_error, "Cleanup after failed connect reported errors");
            }
            return Err(e).context("Failed to connect distributor");
        }

        let reporter = self
            .config
            .stats_interval
            .map(|every| spawn_reporter(Arc::clone(&distributor), every));

        let timeout = self.config.timeout;
        let stop = async move {
            match timeout {
                Some(limit) => tokio::select! {
                    () = shutdown => {}
                    () = tokio::time::sleep(limit) => {
                        info!(timeout_secs = limit.as_secs(), "Run timeout reached");
                    }
                },
                None => shutdown.await,
            }
        };

        let result = distributor.run_until(stop).await;

        if let Some(reporter) = reporter {
            reporter.abort();
        }

        // run() can fail before any signal, leaving sources open
        if result.is_err() && distributor.state() != DistributorState::Idle {
            if let Err(e) = distributor.shutdown().await {
                warn!(error = %e, "Shutdown after failed run reported errors");
            }
        }

        let summary = RunSummary::collect(&distributor, start_time.elapsed());
        publish(&distributor);

        result.context("Distributor stopped with errors")?;
        Ok(summary)
    }
}

fn publish(distributor: &Distributor) {
    record_distributor_stats(&distributor.stats());
    for (name, outcomes) in distributor.target_stats() {
        if let Some(outcomes) = outcomes {
            record_outcome_stats(&name, &outcomes);
        }
    }
}

/// Periodically publish metrics and log throughput
fn spawn_reporter(distributor: Arc<Distributor>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        let mut tracker = ThroughputTracker::new();

        loop {
            ticker.tick().await;
            publish(&distributor);
            if let Some(summary) = tracker.update(distributor.stats(), Instant::now()) {
                info!(%summary, "Distributor statistics");
            }
        }
    })
}
