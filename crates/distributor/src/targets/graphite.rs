//! GraphiteTarget - formatted metrics over a TCP stream
//!
//! Each message goes through a [`Formatter`] and is sent newline-terminated,
//! as Graphite's plaintext protocol expects.

use formatter::{Formatter, GraphiteFormatter};
use tracing::{debug, instrument, trace};

use contracts::{ContractError, DeliveryError, DisconnectCode, Message};

use super::network::{NetworkTransport, TcpTransport, connect_transport};
use crate::pool::WorkerPoolConfig;
use crate::pooled::{TaskHandler, WorkerPoolTarget};

pub struct GraphiteHandler {
    name: String,
    transport: TcpTransport,
    formatter: Box<dyn Formatter>,
}

impl GraphiteHandler {
    pub fn new(
        name: impl Into<String>,
        transport: TcpTransport,
        formatter: impl Formatter + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            formatter: Box::new(formatter),
        }
    }

    pub fn transport(&self) -> &TcpTransport {
        &self.transport
    }

    fn payload(&self, message: &Message) -> Result<String, DeliveryError> {
        let mut body = self
            .formatter
            .format(message)
            .map_err(|e| DeliveryError::format(e.to_string()))?;
        body.push('\n');
        Ok(body)
    }
}

impl TaskHandler for GraphiteHandler {
    type Output = usize;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), ContractError> {
        connect_transport(&self.name, &self.transport)
    }

    #[instrument(name = "graphite_target_send", skip(self, message), fields(target_name = %self.name))]
    fn process(&self, message: &Message) -> Result<usize, DeliveryError> {
        let payload = self.payload(message)?;
        self.transport.send(payload.as_bytes())
    }

    fn on_complete(&self, bytes: usize) {
        trace!(target_name = %self.name, bytes, "Metrics sent");
    }

    fn close(&self, code: DisconnectCode, _reason: &str) -> Result<(), ContractError> {
        self.transport.disconnect();
        debug!(target_name = %self.name, %code, "Graphite connection closed");
        Ok(())
    }
}

/// Pooled Graphite target
pub type GraphiteTarget = WorkerPoolTarget<GraphiteHandler>;

impl WorkerPoolTarget<GraphiteHandler> {
    pub fn graphite(
        name: impl Into<String>,
        addr: impl Into<String>,
        formatter: impl Formatter + 'static,
        pool: WorkerPoolConfig,
    ) -> Self {
        Self::new(
            GraphiteHandler::new(name, TcpTransport::new(addr), formatter),
            pool,
        )
    }

    /// Graphite target using the trading-alert formatter
    pub fn alerts(
        name: impl Into<String>,
        addr: impl Into<String>,
        namespace: Option<&str>,
        pool: WorkerPoolConfig,
    ) -> Self {
        let formatter = match namespace {
            Some(ns) => GraphiteFormatter::with_namespace(ns),
            None => GraphiteFormatter::new(),
        };
        Self::graphite(name, addr, formatter, pool)
    }
}
