//! Distributor - bounded queue and fan-out loop from sources to targets

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_channel::Receiver;
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, instrument, trace, warn};

use contracts::{
    DisconnectCode, DistributionSource, DistributionTarget, DistributorSettings,
    DistributorStats, Message, OutcomeStats, TargetConfig,
};

use crate::error::DistributorError;
use crate::factory::create_target;
use crate::ingress::Ingress;
use crate::metrics::DistributorMetrics;

/// Reason passed to sources and targets when the distributor shuts down
pub const SHUTDOWN_REASON: &str = "shutdown by distributor";

/// Distributor configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributorConfig {
    /// Sleep between loop iterations; zero only yields
    pub pacing_delay: Duration,
    /// Queue capacity; messages arriving at a full queue are dropped
    pub queue_capacity: usize,
    /// Upper bound on a single `on_message` call, `None` = unbounded
    pub delivery_timeout: Option<Duration>,
    /// Code sent to sources and targets on shutdown
    pub shutdown_code: DisconnectCode,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self::from(&DistributorSettings::default())
    }
}

impl From<&DistributorSettings> for DistributorConfig {
    fn from(settings: &DistributorSettings) -> Self {
        Self {
            pacing_delay: settings.pacing_delay(),
            queue_capacity: settings.queue_capacity,
            delivery_timeout: settings.delivery_timeout(),
            shutdown_code: settings.shutdown_code,
        }
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DistributorState {
    /// Built, nothing opened yet
    Created = 0,
    /// Targets and sources opened
    Connected = 1,
    /// Dispatch loop active
    Running = 2,
    /// Shutdown protocol in progress
    ShuttingDown = 3,
    /// Shut down; may be connected again
    Idle = 4,
}

impl DistributorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Connected,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            _ => Self::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Connected => "connected",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for DistributorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: DistributorState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> DistributorState {
        DistributorState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: DistributorState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    fn require(
        &self,
        allowed: &[DistributorState],
        operation: &'static str,
    ) -> Result<DistributorState, DistributorError> {
        let state = self.get();
        if allowed.contains(&state) {
            Ok(state)
        } else {
            Err(DistributorError::InvalidState { operation, state })
        }
    }

    /// Atomically move to `to` from one of `allowed`, returning the previous state
    fn transition(
        &self,
        allowed: &[DistributorState],
        to: DistributorState,
        operation: &'static str,
    ) -> Result<DistributorState, DistributorError> {
        let mut current = self.get();
        loop {
            if !allowed.contains(&current) {
                return Err(DistributorError::InvalidState {
                    operation,
                    state: current,
                });
            }
            match self
                .0
                .compare_exchange(current as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(current),
                Err(actual) => current = DistributorState::from_u8(actual),
            }
        }
    }
}

/// Builder for creating a Distributor
pub struct DistributorBuilder {
    config: DistributorConfig,
    sources: Vec<Arc<dyn DistributionSource>>,
    targets: Vec<Arc<dyn DistributionTarget>>,
    target_configs: Vec<TargetConfig>,
}

impl DistributorBuilder {
    pub fn new(config: DistributorConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            targets: Vec::new(),
            target_configs: Vec::new(),
        }
    }

    pub fn source(mut self, source: Arc<dyn DistributionSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn target(mut self, target: Arc<dyn DistributionTarget>) -> Self {
        self.targets.push(target);
        self
    }

    /// Target created from configuration at build time
    pub fn target_config(mut self, config: TargetConfig) -> Self {
        self.target_configs.push(config);
        self
    }

    pub fn target_configs(mut self, configs: impl IntoIterator<Item = TargetConfig>) -> Self {
        self.target_configs.extend(configs);
        self
    }

    /// Build the distributor. Instance targets are registered before configured ones.
    #[instrument(
        name = "distributor_builder_build",
        skip(self),
        fields(
            sources = self.sources.len(),
            targets = self.targets.len() + self.target_configs.len()
        )
    )]
    pub fn build(self) -> Result<Distributor, DistributorError> {
        let mut distributor = Distributor::new(self.config)?;
        for target in self.targets {
            distributor.add_target(target)?;
        }
        for config in &self.target_configs {
            distributor.add_target(create_target(config)?)?;
        }
        for source in self.sources {
            distributor.add_source(source)?;
        }
        Ok(distributor)
    }
}

/// Fans messages from every source out to every target
///
/// Lifecycle: `connect` → `run` (or `run_until`) → `shutdown`, after which
/// the distributor may be connected again.
pub struct Distributor {
    config: DistributorConfig,
    queue: Receiver<Message>,
    ingress: Ingress,
    sources: Vec<Arc<dyn DistributionSource>>,
    targets: Vec<Arc<dyn DistributionTarget>>,
    state: StateCell,
    /// Held while a message is handed to the targets; a message is never
    /// split between the loop and `flush`
    dispatch: AsyncMutex<()>,
    metrics: Arc<DistributorMetrics>,
}

impl Distributor {
    /// Create a distributor with no sources or targets
    ///
    /// Must be called inside a tokio runtime: sources deliver messages from
    /// their own threads onto this runtime.
    pub fn new(config: DistributorConfig) -> Result<Self, DistributorError> {
        if config.queue_capacity == 0 {
            return Err(DistributorError::Config(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| DistributorError::NoRuntime)?;

        let (tx, rx) = async_channel::bounded(config.queue_capacity);
        let metrics = Arc::new(DistributorMetrics::new());

        Ok(Self {
            config,
            queue: rx,
            ingress: Ingress::new(tx, runtime, Arc::clone(&metrics)),
            sources: Vec::new(),
            targets: Vec::new(),
            state: StateCell::new(DistributorState::Created),
            dispatch: AsyncMutex::new(()),
            metrics,
        })
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    pub fn state(&self) -> DistributorState {
        self.state.get()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Messages waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> &Arc<DistributorMetrics> {
        &self.metrics
    }

    pub fn stats(&self) -> DistributorStats {
        self.metrics
            .snapshot(self.queue.len(), self.ingress.units_in_flight())
    }

    /// Outcome counters for every target that reports them
    pub fn target_stats(&self) -> Vec<(String, Option<OutcomeStats>)> {
        self.targets
            .iter()
            .map(|t| (t.name().to_string(), t.outcome_stats()))
            .collect()
    }

    /// Register a source and install the distributor's message callback on it
    pub fn add_source(
        &mut self,
        source: Arc<dyn DistributionSource>,
    ) -> Result<(), DistributorError> {
        self.state.require(
            &[DistributorState::Created, DistributorState::Idle],
            "add a source",
        )?;
        source.set_on_message(self.ingress.callback())?;
        debug!(source_name = %source.name(), "Source registered");
        self.sources.push(source);
        Ok(())
    }

    /// Register a target; targets receive messages in registration order
    pub fn add_target(
        &mut self,
        target: Arc<dyn DistributionTarget>,
    ) -> Result<(), DistributorError> {
        self.state.require(
            &[DistributorState::Created, DistributorState::Idle],
            "add a target",
        )?;
        debug!(target_name = %target.name(), "Target registered");
        self.targets.push(target);
        Ok(())
    }

    /// Open every target, then every source
    ///
    /// Stops at the first failure; whatever was already opened is released
    /// by `shutdown`.
    #[instrument(name = "distributor_connect", skip(self))]
    pub async fn connect(&self) -> Result<(), DistributorError> {
        self.state.require(
            &[DistributorState::Created, DistributorState::Idle],
            "connect",
        )?;

        for target in &self.targets {
            target.open().await.map_err(DistributorError::Connect)?;
            debug!(target_name = %target.name(), "Target opened");
        }
        for source in &self.sources {
            source.open().map_err(DistributorError::Connect)?;
            debug!(source_name = %source.name(), "Source opened");
        }

        self.state.set(DistributorState::Connected);
        info!(
            sources = self.sources.len(),
            targets = self.targets.len(),
            "Distributor connected"
        );
        Ok(())
    }

    /// Run the dispatch loop
    ///
    /// Takes one message at a time off the queue and delivers it to every
    /// target in registration order, sleeping the pacing delay between
    /// iterations. Returns `Ok` once `shutdown` has begun; the check happens
    /// between messages, so a message is always offered to every target.
    ///
    /// Dropping the returned future mid-delivery skips the remaining targets
    /// for that message. Use `run_until` to stop on an external signal.
    #[instrument(name = "distributor_run", skip(self))]
    pub async fn run(&self) -> Result<(), DistributorError> {
        if self.targets.is_empty() {
            return Err(DistributorError::NoTargets);
        }
        if self.sources.is_empty() {
            return Err(DistributorError::NoSources);
        }
        self.state.transition(
            &[DistributorState::Connected],
            DistributorState::Running,
            "run",
        )?;

        info!(
            sources = self.sources.len(),
            targets = self.targets.len(),
            "Distributor started"
        );

        let mut message_count: u64 = 0;
        loop {
            {
                let _dispatch = self.dispatch.lock().await;
                // ShuttingDown, or already Idle if shutdown finished meanwhile
                if self.state.get() != DistributorState::Running {
                    info!(messages = message_count, "Shutdown started, dispatch loop stopped");
                    return Ok(());
                }

                if let Ok(message) = self.queue.try_recv() {
                    self.distribute(message).await;
                    message_count += 1;

                    if message_count % 100 == 0 {
                        debug!(messages = message_count, "Distributor progress");
                    }
                }
            }

            self.pace().await;
        }
    }

    /// Run until `signal` resolves, then shut down
    ///
    /// A delivery in progress when the signal fires is finished before the
    /// queue is flushed.
    pub async fn run_until<F>(&self, signal: F) -> Result<(), DistributorError>
    where
        F: Future<Output = ()>,
    {
        let run = self.run();
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => return result,
            () = signal => info!("Stop signal received"),
        }

        let (run_result, shutdown_result) = tokio::join!(run, self.shutdown());
        shutdown_result?;
        run_result
    }

    /// Deliver every queued message, returning how many were delivered
    #[instrument(name = "distributor_flush", skip(self))]
    pub async fn flush(&self) -> usize {
        info!(queued = self.queue.len(), "Flushing queue");

        let _dispatch = self.dispatch.lock().await;
        let mut flushed = 0;
        while let Ok(message) = self.queue.try_recv() {
            self.distribute(message).await;
            flushed += 1;
            self.pace().await;
        }

        info!(flushed, "Queue flushed");
        flushed
    }

    /// Stop accepting messages, close sources, drain the queue, close targets
    /// and wait for in-flight ingestion
    ///
    /// Every source and target is closed even if some fail; failures are
    /// returned together as [`DistributorError::Teardown`]. The distributor
    /// ends `Idle` either way.
    #[instrument(name = "distributor_shutdown", skip(self))]
    pub async fn shutdown(&self) -> Result<(), DistributorError> {
        let previous = self.state.transition(
            &[
                DistributorState::Created,
                DistributorState::Connected,
                DistributorState::Running,
                DistributorState::Idle,
            ],
            DistributorState::ShuttingDown,
            "shut down",
        )?;
        info!(from = %previous, "Shutting down distributor");

        self.ingress.begin_shutdown();
        let code = self.config.shutdown_code;
        let mut failures = Vec::new();

        let sources = self.sources.clone();
        info!(sources = sources.len(), "Closing sources");
        for source in &sources {
            if let Err(e) = source.close(code, SHUTDOWN_REASON) {
                warn!(source_name = %source.name(), error = %e, "Source close failed");
                failures.push(e);
            }
        }

        // Units started before the flag was set may still be enqueueing
        self.ingress.join_units().await;
        self.flush().await;

        let targets = self.targets.clone();
        info!(targets = targets.len(), "Closing targets");
        for target in &targets {
            if let Err(e) = target.close(code, SHUTDOWN_REASON).await {
                warn!(target_name = %target.name(), error = %e, "Target close failed");
                failures.push(e);
            }
        }

        info!(
            units = self.ingress.units_in_flight(),
            "Waiting for ingestion units"
        );
        self.ingress.join_units().await;

        self.ingress.end_shutdown();
        self.state.set(DistributorState::Idle);

        if failures.is_empty() {
            info!("Distributor shutdown complete");
            Ok(())
        } else {
            error!(failures = failures.len(), "Distributor shutdown completed with errors");
            Err(DistributorError::Teardown { failures })
        }
    }

    async fn pace(&self) {
        if self.config.pacing_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.pacing_delay).await;
        }
    }

    async fn distribute(&self, message: Message) {
        trace!(len = message.len(), targets = self.targets.len(), "Distributing message");
        for target in &self.targets {
            self.deliver(target.as_ref(), message.clone()).await;
        }
        self.metrics.inc_dispatched();
    }

    async fn deliver(&self, target: &dyn DistributionTarget, message: Message) {
        let delivery = target.on_message(message);
        let result = match self.config.delivery_timeout {
            Some(limit) => match tokio::time::timeout(limit, delivery).await {
                Ok(result) => result,
                Err(_) => {
                    self.metrics.inc_delivery_timeouts();
                    warn!(
                        target_name = %target.name(),
                        timeout_ms = limit.as_millis() as u64,
                        "Delivery timed out, target skipped"
                    );
                    return;
                }
            },
            None => delivery.await,
        };

        match result {
            Ok(()) => trace!(target_name = %target.name(), "Message delivered"),
            Err(e) => {
                self.metrics.inc_delivery_failures();
                error!(target_name = %target.name(), error = %e, "Delivery failed");
            }
        }
    }
}

/// Convenience function to create a distributor from settings and target configs
#[instrument(name = "distributor_create", skip(settings, targets))]
pub fn create_distributor(
    settings: &DistributorSettings,
    targets: &[TargetConfig],
) -> Result<Distributor, DistributorError> {
    DistributorBuilder::new(DistributorConfig::from(settings))
        .target_configs(targets.iter().cloned())
        .build()
}
