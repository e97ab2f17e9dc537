//! # Ingestion
//!
//! Message sources feeding the distributor.
//!
//! Responsibilities:
//! - Produce messages from sockets, generators or in-process producers
//! - Hand every message to the single callback registered by the distributor
//! - Start and stop background producers on `open` / `close`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{MockSource, MockSourceConfig};
//!
//! let source = Arc::new(MockSource::new("mock", MockSourceConfig::default()));
//! distributor.add_source(source)?;
//! distributor.connect().await?;
//! ```

mod channel;
mod error;
mod factory;
mod mock;
mod tcp_lines;

pub use channel::ChannelSource;
pub use error::{IngestionError, Result};
pub use factory::create_source;
pub use mock::{MockSource, MockSourceConfig};
pub use tcp_lines::{MAX_LINE_BYTES, TcpLineSource};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use contracts::{Message, MessageCallback};
use metrics::counter;

/// Poll interval of background threads checking their stop flag
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Count and forward one message
pub(crate) fn emit(source_name: &str, callback: &MessageCallback, message: Message) {
    counter!("alert_distributor_source_messages_total", "source" => source_name.to_string())
        .increment(1);
    callback(message);
}

/// Mark a source running; fails if it already was
pub(crate) fn mark_open(source_name: &str, running: &AtomicBool) -> Result<()> {
    if running.swap(true, Ordering::SeqCst) {
        return Err(IngestionError::AlreadyOpen {
            source_name: source_name.to_string(),
        });
    }
    Ok(())
}
