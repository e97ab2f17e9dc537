//! Ingress - the callback sources push messages into
//!
//! Sources may call it from any thread. Each accepted message becomes one
//! short ingestion unit on the runtime that performs the non-blocking enqueue,
//! so a source never waits on the distributor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_channel::{Sender, TrySendError};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace, warn};

use contracts::{Message, MessageCallback};

use crate::metrics::DistributorMetrics;

#[derive(Clone)]
pub(crate) struct Ingress {
    queue: Sender<Message>,
    shutting_down: Arc<AtomicBool>,
    units: TaskTracker,
    runtime: Handle,
    metrics: Arc<DistributorMetrics>,
}

impl Ingress {
    pub(crate) fn new(
        queue: Sender<Message>,
        runtime: Handle,
        metrics: Arc<DistributorMetrics>,
    ) -> Self {
        Self {
            queue,
            shutting_down: Arc::new(AtomicBool::new(false)),
            units: TaskTracker::new(),
            runtime,
            metrics,
        }
    }

    /// Callback handed to every registered source
    pub(crate) fn callback(&self) -> MessageCallback {
        let ingress = self.clone();
        Arc::new(move |message: Message| ingress.accept(message))
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub(crate) fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub(crate) fn end_shutdown(&self) {
        self.shutting_down.store(false, Ordering::SeqCst);
    }

    /// Ingestion units not yet finished
    pub(crate) fn units_in_flight(&self) -> usize {
        self.units.len()
    }

    /// Wait for every ingestion unit started so far
    pub(crate) async fn join_units(&self) {
        self.units.close();
        self.units.wait().await;
        self.units.reopen();
    }

    fn reject(&self) {
        self.metrics.inc_rejected_shutdown();
        warn!("Shutdown in progress, message not accepted");
    }

    pub(crate) fn accept(&self, message: Message) {
        if self.is_shutting_down() {
            self.reject();
            return;
        }

        let unit = self.clone();
        self.units
            .spawn_on(async move { unit.enqueue(message) }, &self.runtime);
        trace!("Ingestion unit started");
    }

    fn enqueue(&self, message: Message) {
        // The flag may have flipped since the unit was started
        if self.is_shutting_down() {
            self.reject();
            return;
        }

        match self.queue.try_send(message) {
            Ok(()) => {
                self.metrics.inc_enqueued();
                debug!(queued = self.queue.len(), "Message enqueued");
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.inc_dropped_full();
                error!(
                    capacity = self.queue.capacity().unwrap_or_default(),
                    "Queue full, message dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                error!("Queue closed, message dropped");
            }
        }
    }
}
