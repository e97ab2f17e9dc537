//! WorkerPool - fixed number of workers running blocking tasks
//!
//! Submitted tasks wait in a FIFO queue; `size` workers take them in order and
//! run each one on the blocking thread pool. Every task resolves to exactly one
//! [`TaskOutcome`], which is handed to the caller's completion callback.
//!
//! A task that exceeds the task timeout resolves as `TimedOut` right away, but
//! its worker stays occupied until the blocking call returns. At most `size`
//! calls are ever in progress, even against an endpoint that hangs.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_channel::{Receiver, Sender};
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use contracts::{
    ContractError, DEFAULT_POOL_SIZE, DeliveryError, OutcomeStats, TargetConfig, TaskOutcome,
};

use crate::metrics::PoolMetrics;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Blocking call that outlived its timeout
type Straggler<T> = JoinHandle<Result<T, DeliveryError>>;

/// Worker pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of workers (tasks running at once)
    pub size: usize,
    /// Per-task timeout, `None` = unbounded
    pub task_timeout: Option<Duration>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl WorkerPoolConfig {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            task_timeout: None,
        }
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn from_target_config(config: &TargetConfig) -> Self {
        Self {
            size: config.pool_size,
            task_timeout: config.task_timeout(),
        }
    }
}

struct Running {
    jobs: Sender<Job>,
    workers: TaskTracker,
    cancel: CancellationToken,
}

/// Fixed-size pool executing blocking tasks
pub struct WorkerPool {
    name: String,
    config: WorkerPoolConfig,
    running: Mutex<Option<Running>>,
    metrics: Arc<PoolMetrics>,
}

impl WorkerPool {
    /// Create a stopped pool; call [`start`](Self::start) before submitting
    pub fn new(name: impl Into<String>, config: WorkerPoolConfig) -> Self {
        Self {
            name: name.into(),
            config,
            running: Mutex::new(None),
            metrics: Arc::new(PoolMetrics::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> WorkerPoolConfig {
        self.config
    }

    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    pub fn stats(&self) -> OutcomeStats {
        self.metrics.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    /// Tasks waiting for a free worker
    pub fn queued(&self) -> usize {
        self.running().as_ref().map_or(0, |r| r.jobs.len())
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn closed_error(&self) -> ContractError {
        ContractError::PoolClosed {
            target_name: self.name.clone(),
        }
    }

    /// Spawn the workers. Starting a running pool is a no-op.
    pub fn start(&self) -> Result<(), ContractError> {
        let mut running = self.running();
        if running.is_some() {
            return Ok(());
        }

        let runtime = Handle::try_current()
            .map_err(|e| ContractError::target_open(&self.name, e.to_string()))?;

        let (jobs, queue) = async_channel::unbounded::<Job>();
        let workers = TaskTracker::new();
        let size = self.config.size.max(1);
        for _ in 0..size {
            workers.spawn_on(worker_loop(queue.clone()), &runtime);
        }
        // Closed up front: `wait` resolves once every worker is done
        workers.close();

        *running = Some(Running {
            jobs,
            workers,
            cancel: CancellationToken::new(),
        });

        debug!(pool = %self.name, size, "Worker pool started");
        Ok(())
    }

    /// Queue `work` for execution; `on_done` receives its outcome
    pub fn submit<T, F, C>(&self, work: F, on_done: C) -> Result<(), ContractError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, DeliveryError> + Send + 'static,
        C: FnOnce(TaskOutcome<T>) + Send + 'static,
    {
        let running = self.running();
        let Some(running) = running.as_ref() else {
            return Err(self.closed_error());
        };

        let cancel = running.cancel.clone();
        let timeout = self.config.task_timeout;
        let metrics = Arc::clone(&self.metrics);
        let pool = self.name.clone();

        let job: Job = Box::pin(async move {
            let (outcome, straggler) = if cancel.is_cancelled() {
                (TaskOutcome::Cancelled, None)
            } else {
                execute(work, timeout).await
            };
            metrics.record(outcome.kind());

            if std::panic::catch_unwind(AssertUnwindSafe(|| on_done(outcome))).is_err() {
                error!(pool = %pool, "Task outcome callback panicked");
            }

            if let Some(straggler) = straggler {
                let _ = straggler.await;
                debug!(pool = %pool, "Timed-out task returned, worker free");
            }
        });

        self.metrics.inc_submitted();
        running.jobs.try_send(job).map_err(|_| self.closed_error())
    }

    /// Resolve every queued, not yet started task as `Cancelled`
    ///
    /// Running tasks are unaffected; tasks submitted afterwards run normally.
    pub fn cancel_pending(&self) {
        if let Some(running) = self.running().as_mut() {
            let pending = running.jobs.len();
            std::mem::replace(&mut running.cancel, CancellationToken::new()).cancel();
            info!(pool = %self.name, pending, "Pending tasks cancelled");
        }
    }

    /// Stop accepting tasks and wait until every submitted task has resolved
    ///
    /// Queued tasks still run. The pool can be started again afterwards.
    pub async fn shutdown(&self) {
        let running = self.running().take();
        let Some(running) = running else {
            return;
        };

        running.jobs.close();
        info!(
            pool = %self.name,
            queued = running.jobs.len(),
            "Worker pool closing, waiting for tasks"
        );
        running.workers.wait().await;
        debug!(pool = %self.name, "Worker pool closed");
    }
}

async fn worker_loop(queue: Receiver<Job>) {
    while let Ok(job) = queue.recv().await {
        job.await;
    }
}

/// Run `work` on the blocking pool; a timed-out call is handed back still running
async fn execute<T, F>(work: F, timeout: Option<Duration>) -> (TaskOutcome<T>, Option<Straggler<T>>)
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DeliveryError> + Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(work);
    let joined = match timeout {
        None => task.await,
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => return (TaskOutcome::TimedOut, Some(task)),
        },
    };
    (classify(joined), None)
}

fn classify<T>(joined: Result<Result<T, DeliveryError>, JoinError>) -> TaskOutcome<T> {
    match joined {
        Ok(Ok(value)) => TaskOutcome::Completed(value),
        Ok(Err(error)) => TaskOutcome::Errored(error),
        Err(e) if e.is_cancelled() => TaskOutcome::Cancelled,
        Err(e) => TaskOutcome::Errored(DeliveryError::panicked(panic_message(e.into_panic()))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
