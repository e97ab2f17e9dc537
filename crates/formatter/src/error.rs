//! Formatter error types

use thiserror::Error;

/// Failure to translate a message into its wire format
#[derive(Debug, Error)]
pub enum FormatError {
    /// Input is not valid JSON
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Input is valid JSON but not an object
    #[error("unsupported message type: expected a JSON object, got {found}")]
    UnsupportedInput { found: &'static str },

    /// A required field is absent
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// A field has the wrong JSON type
    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// Timestamp is not ISO-8601
    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}
