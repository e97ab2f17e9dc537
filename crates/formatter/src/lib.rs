//! # Formatter
//!
//! Message formatting collaborators used by targets before transmission.
//!
//! - [`PassthroughFormatter`] returns the message unchanged
//! - [`GraphiteFormatter`] turns a JSON trading alert into Graphite plaintext metrics
//!
//! ```
//! use formatter::{Formatter, GraphiteFormatter};
//!
//! let formatter = GraphiteFormatter::with_namespace("ns");
//! let lines = formatter
//!     .format(r#"{"name":"S","symbol":"EX:SYM","direction":"buy","price":1.5,"timestamp":"2024-01-01T00:00:00Z"}"#)
//!     .unwrap();
//! assert_eq!(lines, "ns.S.EX.SYM.direction 1 1704067200\nns.S.EX.SYM.price 1.5 1704067200");
//! ```

mod error;
mod graphite;

pub use error::FormatError;
pub use graphite::{Alert, GraphiteFormatter};

/// Message formatter interface
pub trait Formatter: Send + Sync {
    /// Format one message for the wire
    fn format(&self, message: &str) -> Result<String, FormatError>;
}

/// Formatter that returns the message as is
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFormatter;

impl Formatter for PassthroughFormatter {
    fn format(&self, message: &str) -> Result<String, FormatError> {
        Ok(message.to_string())
    }
}
