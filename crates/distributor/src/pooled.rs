//! WorkerPoolTarget - targets that process messages on a worker pool
//!
//! `on_message` only queues the work and returns, so a slow endpoint never
//! stalls the dispatch loop. The handler reacts to each task's outcome through
//! the `on_*` hooks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, trace, warn};

use contracts::{
    ContractError, DeliveryError, DisconnectCode, DistributionTarget, Message, OutcomeStats,
    TaskOutcome,
};

use crate::pool::{WorkerPool, WorkerPoolConfig};

/// Message processing logic of a pooled target
///
/// `process` runs on a blocking worker thread. Exactly one hook fires per
/// submitted message.
pub trait TaskHandler: Send + Sync + 'static {
    /// Result of a successful `process` call
    type Output: Send + 'static;

    fn name(&self) -> &str;

    /// Acquire resources (connections, files) before the first message
    fn open(&self) -> Result<(), ContractError> {
        Ok(())
    }

    /// Deliver one message
    fn process(&self, message: &Message) -> Result<Self::Output, DeliveryError>;

    fn on_complete(&self, _output: Self::Output) {
        trace!(target_name = %self.name(), "Task completed");
    }

    fn on_timeout(&self) {
        warn!(target_name = %self.name(), "Task timed out");
    }

    fn on_cancel(&self) {
        debug!(target_name = %self.name(), "Task cancelled");
    }

    fn on_error(&self, error: DeliveryError) {
        error!(target_name = %self.name(), error = %error, "Task failed");
    }

    /// Route an outcome to its hook
    fn on_outcome(&self, outcome: TaskOutcome<Self::Output>) {
        match outcome {
            TaskOutcome::Completed(output) => self.on_complete(output),
            TaskOutcome::TimedOut => self.on_timeout(),
            TaskOutcome::Cancelled => self.on_cancel(),
            TaskOutcome::Errored(error) => self.on_error(error),
        }
    }

    /// Release resources after the pool has drained
    fn close(&self, _code: DisconnectCode, _reason: &str) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Target that runs a [`TaskHandler`] on a [`WorkerPool`]
pub struct WorkerPoolTarget<H: TaskHandler> {
    handler: Arc<H>,
    pool: WorkerPool,
}

impl<H: TaskHandler> WorkerPoolTarget<H> {
    pub fn new(handler: H, config: WorkerPoolConfig) -> Self {
        let pool = WorkerPool::new(handler.name(), config);
        Self {
            handler: Arc::new(handler),
            pool,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Resolve queued messages as cancelled, see [`WorkerPool::cancel_pending`]
    pub fn cancel_pending(&self) {
        self.pool.cancel_pending();
    }

    /// Run a handler call that may block on I/O off the async workers
    async fn blocking<F>(&self, call: F) -> Result<(), ContractError>
    where
        F: FnOnce(&H) -> Result<(), ContractError> + Send + 'static,
    {
        let handler = Arc::clone(&self.handler);
        tokio::task::spawn_blocking(move || call(&handler))
            .await
            .map_err(|e| ContractError::Other(format!("target '{}': {}", self.name(), e)))?
    }
}

#[async_trait]
impl<H: TaskHandler> DistributionTarget for WorkerPoolTarget<H> {
    fn name(&self) -> &str {
        self.handler.name()
    }

    async fn open(&self) -> Result<(), ContractError> {
        self.blocking(|handler| handler.open()).await?;
        self.pool.start()
    }

    async fn on_message(&self, message: Message) -> Result<(), ContractError> {
        let worker = Arc::clone(&self.handler);
        let hooks = Arc::clone(&self.handler);
        self.pool.submit(
            move || worker.process(&message),
            move |outcome| hooks.on_outcome(outcome),
        )
    }

    fn process(&self, message: &Message) -> Result<(), DeliveryError> {
        self.handler.process(message).map(drop)
    }

    async fn close(&self, code: DisconnectCode, reason: &str) -> Result<(), ContractError> {
        self.pool.shutdown().await;
        let reason = reason.to_string();
        self.blocking(move |handler| handler.close(code, &reason))
            .await
    }

    fn outcome_stats(&self) -> Option<OutcomeStats> {
        Some(self.pool.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingHandler {
        processed: Mutex<Vec<String>>,
        completed: AtomicUsize,
        errors: AtomicUsize,
        timeouts: AtomicUsize,
        closed_with: Mutex<Option<(DisconnectCode, String)>>,
    }

    impl TaskHandler for CountingHandler {
        type Output = usize;

        fn name(&self) -> &str {
            "counting"
        }

        fn process(&self, message: &Message) -> Result<usize, DeliveryError> {
            match message.as_str() {
                "fail" => Err(DeliveryError::Other("refused".into())),
                "slow" => {
                    std::thread::sleep(Duration::from_millis(100));
                    Ok(0)
                }
                text => {
                    self.processed.lock().unwrap().push(text.to_string());
                    Ok(text.len())
                }
            }
        }

        fn on_complete(&self, _output: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_timeout(&self) {
            self.timeouts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _error: DeliveryError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&self, code: DisconnectCode, reason: &str) -> Result<(), ContractError> {
            *self.closed_with.lock().unwrap() = Some((code, reason.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pool_of_one_delivers_in_order() {
        let target = WorkerPoolTarget::new(CountingHandler::default(), WorkerPoolConfig::new(1));
        target.open().await.unwrap();

        for text in ["a", "b", "c"] {
            target.on_message(Message::from(text)).await.unwrap();
        }
        target
            .close(DisconnectCode::SHUTDOWN, "done")
            .await
            .unwrap();

        let handler = target.handler();
        assert_eq!(*handler.processed.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(handler.completed.load(Ordering::SeqCst), 3);
        assert_eq!(
            *handler.closed_with.lock().unwrap(),
            Some((DisconnectCode::SHUTDOWN, "done".to_string()))
        );
    }

    #[tokio::test]
    async fn test_failure_fires_on_error_once() {
        let target = WorkerPoolTarget::new(CountingHandler::default(), WorkerPoolConfig::new(4));
        target.open().await.unwrap();

        target.on_message(Message::from("fail")).await.unwrap();
        target.on_message(Message::from("ok")).await.unwrap();
        target.close(DisconnectCode::SHUTDOWN, "").await.unwrap();

        let handler = target.handler();
        assert_eq!(handler.errors.load(Ordering::SeqCst), 1);
        assert_eq!(handler.completed.load(Ordering::SeqCst), 1);

        let stats = target.outcome_stats().unwrap();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.errored, 1);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test]
    async fn test_timeout_hook() {
        let config = WorkerPoolConfig::new(1).with_task_timeout(Duration::from_millis(10));
        let target = WorkerPoolTarget::new(CountingHandler::default(), config);
        target.open().await.unwrap();

        target.on_message(Message::from("slow")).await.unwrap();
        target.close(DisconnectCode::SHUTDOWN, "").await.unwrap();

        assert_eq!(target.handler().timeouts.load(Ordering::SeqCst), 1);
        assert_eq!(target.handler().completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_message_after_close_is_refused() {
        let target = WorkerPoolTarget::new(CountingHandler::default(), WorkerPoolConfig::new(1));
        target.open().await.unwrap();
        target.close(DisconnectCode::SHUTDOWN, "").await.unwrap();

        let err = target.on_message(Message::from("late")).await.unwrap_err();
        assert!(matches!(err, ContractError::PoolClosed { .. }));
        assert!(target.handler().processed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inline_process_skips_pool() {
        let target = WorkerPoolTarget::new(CountingHandler::default(), WorkerPoolConfig::new(1));
        target.process(&Message::from("direct")).unwrap();
        assert_eq!(*target.handler().processed.lock().unwrap(), vec!["direct"]);
    }
}
